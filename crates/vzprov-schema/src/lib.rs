//! Data model for vzprov: container identifiers, the desired container spec,
//! invocation parameters, host settings with the default table, and the codec
//! for the `NETIF` interface descriptor line stored in container config files.

pub mod invocation;
pub mod netif;
pub mod settings;
pub mod spec;
pub mod types;

pub use invocation::{Invocation, InvocationError, Verb};
pub use netif::{NetifChange, NetifDescriptor, NetifError, IFNAME_KEY};
pub use settings::{BackendSettings, Defaults, Settings, SettingsError};
pub use spec::{parse_spec_file, parse_spec_str, ContainerSpec, SpecError};
pub use types::{Ctid, InvalidCtid};
