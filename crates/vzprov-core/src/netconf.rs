//! Reconciliation of the `NETIF="..."` line in a container's config file.
//!
//! The file is rewritten through a temporary file in the same directory and
//! renamed over the original, so an interrupted rewrite leaves either the old
//! or the new line in place, never neither.

use crate::CoreError;
use fs2::FileExt;
use serde::Serialize;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info};
use vzprov_schema::{NetifChange, NetifDescriptor};

pub const NETIF_KEY: &str = "NETIF";

/// A container configuration file, normally `<conf_dir>/<ctid>.conf`.
#[derive(Debug, Clone)]
pub struct ContainerConf {
    path: PathBuf,
}

impl ContainerConf {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Lock file guarding rewrites, next to the config file.
    pub fn lock_path(&self) -> PathBuf {
        let file_name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.path.with_file_name(format!(".{file_name}.vzprov.lock"))
    }

    fn read(&self) -> Result<String, CoreError> {
        fs::read_to_string(&self.path).map_err(|e| CoreError::Reconcile {
            path: self.path.clone(),
            reason: e.to_string(),
        })
    }

    /// Raw unquoted NETIF value, or `None` when the file has no NETIF line.
    pub fn netif_value(&self) -> Result<Option<String>, CoreError> {
        Ok(extract_netif(&self.read()?))
    }

    /// Parsed NETIF descriptor; a missing line reads as no interfaces.
    pub fn descriptor(&self) -> Result<NetifDescriptor, CoreError> {
        let value = self.netif_value()?.unwrap_or_default();
        NetifDescriptor::parse(&value).map_err(|source| CoreError::Parse {
            path: self.path.clone(),
            line: format!("{NETIF_KEY}=\"{value}\""),
            source,
        })
    }

    /// Replace the NETIF line with `descriptor`, keeping every other line in
    /// order. Returns the line written.
    pub fn write_descriptor(&self, descriptor: &NetifDescriptor) -> Result<String, CoreError> {
        let content = self.read()?;
        let line = format!("{NETIF_KEY}=\"{descriptor}\"");
        let mut out: String = content
            .lines()
            .filter(|l| !is_netif_line(l))
            .flat_map(|l| [l, "\n"])
            .collect();
        out.push_str(&line);
        out.push('\n');

        self.replace(&out).map_err(|source| CoreError::Write {
            path: self.path.clone(),
            line: line.clone(),
            source,
        })?;
        debug!("wrote {line} to {}", self.path.display());
        Ok(line)
    }

    fn replace(&self, content: &str) -> std::io::Result<()> {
        let dir = self.path.parent().unwrap_or_else(|| Path::new("."));
        let permissions = fs::metadata(&self.path)?.permissions();
        let mut tmp = NamedTempFile::new_in(dir)?;
        tmp.write_all(content.as_bytes())?;
        tmp.as_file().sync_all()?;
        fs::set_permissions(tmp.path(), permissions)?;
        tmp.persist(&self.path).map_err(|e| e.error)?;
        fs::File::open(dir)?.sync_all()
    }
}

/// Exclusive advisory lock on a config file's lock file, held for the whole
/// read-merge-replace cycle so concurrent rewrites cannot lose each other's
/// changes. Released on drop.
pub struct ConfLock {
    file: File,
}

impl ConfLock {
    /// Block until no other process holds the lock for `conf`.
    pub fn acquire(conf: &ContainerConf) -> Result<Self, CoreError> {
        let path = conf.lock_path();
        let lock_err = |e: std::io::Error| CoreError::Reconcile {
            path: path.clone(),
            reason: format!("cannot lock: {e}"),
        };
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(&path)
            .map_err(lock_err)?;
        file.lock_exclusive().map_err(lock_err)?;
        debug!("locked {}", path.display());
        Ok(Self { file })
    }
}

impl Drop for ConfLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}

fn is_netif_line(line: &str) -> bool {
    line.trim_start()
        .strip_prefix(NETIF_KEY)
        .is_some_and(|rest| rest.trim_start().starts_with('='))
}

/// Value of the last NETIF line with wrapping quotes removed.
fn extract_netif(content: &str) -> Option<String> {
    content
        .lines()
        .rfind(|l| is_netif_line(l))
        .and_then(|l| l.split_once('='))
        .map(|(_, value)| unquote(value.trim()).to_owned())
}

fn unquote(value: &str) -> &str {
    for quote in ['"', '\''] {
        if let Some(inner) = value
            .strip_prefix(quote)
            .and_then(|v| v.strip_suffix(quote))
        {
            return inner;
        }
    }
    value
}

/// Outcome of a reconcile: the descriptor before and after the change, and
/// the line written.
#[derive(Debug, Clone, Serialize)]
pub struct Reconciled {
    #[serde(skip)]
    pub before: NetifDescriptor,
    #[serde(skip)]
    pub after: NetifDescriptor,
    pub line: String,
}

impl Reconciled {
    pub fn changed(&self) -> bool {
        self.before != self.after
    }
}

/// Read the container's NETIF descriptor, merge `change` into the entry it
/// names, and write the merged descriptor back.
pub fn reconcile(conf: &ContainerConf, change: &NetifChange) -> Result<Reconciled, CoreError> {
    let _lock = ConfLock::acquire(conf)?;

    let before = conf.descriptor()?;
    let mut after = before.clone();
    after.apply(change).map_err(|e| CoreError::Validation(e.to_string()))?;

    let line = conf.write_descriptor(&after)?;
    info!(
        "reconciled {} interface(s) in {}",
        after.len(),
        conf.path().display()
    );
    Ok(Reconciled {
        before,
        after,
        line,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    const CONF: &str = r#"# OpenVZ container config
ONBOOT="yes"
PHYSPAGES="0:131072"
NETIF="ifname=eth0,mac=AA:BB,host_ifname=veth101.0;ifname=eth1,mac=CC:DD"
HOSTNAME="vm1.example.com"
"#;

    fn write_conf(dir: &Path, content: &str) -> ContainerConf {
        let path = dir.join("101.conf");
        fs::write(&path, content).unwrap();
        ContainerConf::new(path)
    }

    #[test]
    fn extracts_and_unquotes_netif() {
        assert_eq!(
            extract_netif(CONF).as_deref(),
            Some("ifname=eth0,mac=AA:BB,host_ifname=veth101.0;ifname=eth1,mac=CC:DD")
        );
        assert_eq!(extract_netif("NETIF='ifname=eth0'").as_deref(), Some("ifname=eth0"));
        assert_eq!(extract_netif("NETIF=ifname=eth0").as_deref(), Some("ifname=eth0"));
        assert_eq!(extract_netif("HOSTNAME=\"x\"\n"), None);
    }

    #[test]
    fn other_keys_with_netif_prefix_are_not_matched() {
        assert!(!is_netif_line("NETIF_EXTRA=\"x\""));
        assert!(is_netif_line("  NETIF = \"x\""));
    }

    #[test]
    fn lock_sits_next_to_conf() {
        let conf = ContainerConf::new("/etc/vz/conf/101.conf");
        assert_eq!(conf.path(), Path::new("/etc/vz/conf/101.conf"));
        assert_eq!(conf.lock_path(), Path::new("/etc/vz/conf/.101.conf.vzprov.lock"));
    }

    #[test]
    fn reconcile_merges_and_preserves_other_lines() {
        let dir = tempfile::tempdir().unwrap();
        let conf = write_conf(dir.path(), CONF);

        let change = NetifChange::new("eth0").with("mac", "11:22");
        let result = reconcile(&conf, &change).unwrap();
        assert!(result.changed());

        let written = fs::read_to_string(conf.path()).unwrap();
        let lines: Vec<&str> = written.lines().collect();
        assert_eq!(lines[0], "# OpenVZ container config");
        assert_eq!(lines[1], "ONBOOT=\"yes\"");
        assert_eq!(lines[3], "HOSTNAME=\"vm1.example.com\"");
        assert_eq!(written.matches("NETIF=").count(), 1);
        assert!(lines.last().unwrap().starts_with("NETIF=\""));

        let d = conf.descriptor().unwrap();
        assert_eq!(d.get("eth0").unwrap()["mac"], "11:22");
        assert_eq!(d.get("eth0").unwrap()["host_ifname"], "veth101.0");
        assert_eq!(d.get("eth1").unwrap()["mac"], "CC:DD");
    }

    #[test]
    fn reconcile_without_netif_line_creates_one() {
        let dir = tempfile::tempdir().unwrap();
        let conf = write_conf(dir.path(), "ONBOOT=\"yes\"\n");
        let change = NetifChange::new("eth0").with("bridge", "vmbr0");
        let result = reconcile(&conf, &change).unwrap();
        assert_eq!(result.line, "NETIF=\"ifname=eth0,bridge=vmbr0\"");
        assert_eq!(
            fs::read_to_string(conf.path()).unwrap(),
            "ONBOOT=\"yes\"\nNETIF=\"ifname=eth0,bridge=vmbr0\"\n"
        );
    }

    #[test]
    fn reapplying_same_change_reports_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let conf = write_conf(dir.path(), CONF);
        let change = NetifChange::new("eth1").with("mac", "CC:DD");
        assert!(!reconcile(&conf, &change).unwrap().changed());
    }

    #[test]
    fn malformed_netif_is_parse_error_with_line() {
        let dir = tempfile::tempdir().unwrap();
        let conf = write_conf(dir.path(), "NETIF=\"ifname=eth0,garbage\"\n");
        let err = reconcile(&conf, &NetifChange::new("eth0")).unwrap_err();
        match err {
            CoreError::Parse { line, .. } => assert!(line.contains("garbage")),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(
            fs::read_to_string(conf.path()).unwrap(),
            "NETIF=\"ifname=eth0,garbage\"\n",
            "a failed reconcile must not touch the file"
        );
    }

    #[test]
    fn missing_file_is_reconcile_error() {
        let dir = tempfile::tempdir().unwrap();
        let conf = ContainerConf::new(dir.path().join("999.conf"));
        let err = reconcile(&conf, &NetifChange::new("eth0")).unwrap_err();
        assert!(matches!(err, CoreError::Reconcile { .. }));
    }

    #[test]
    fn rewrite_keeps_file_permissions() {
        let dir = tempfile::tempdir().unwrap();
        let conf = write_conf(dir.path(), CONF);
        fs::set_permissions(conf.path(), fs::Permissions::from_mode(0o644)).unwrap();
        reconcile(&conf, &NetifChange::new("eth2")).unwrap();
        let mode = fs::metadata(conf.path()).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o644);
    }

    #[test]
    fn reconcile_takes_the_lock_next_to_conf() {
        let dir = tempfile::tempdir().unwrap();
        let conf = write_conf(dir.path(), CONF);
        reconcile(&conf, &NetifChange::new("eth0").with("bridge", "vmbr0")).unwrap();
        assert!(dir.path().join(".101.conf.vzprov.lock").exists());
    }

    #[test]
    fn held_lock_blocks_a_concurrent_reconcile() {
        let dir = tempfile::tempdir().unwrap();
        let conf = write_conf(dir.path(), CONF);
        let lock = ConfLock::acquire(&conf).unwrap();

        let worker = {
            let conf = conf.clone();
            std::thread::spawn(move || {
                reconcile(&conf, &NetifChange::new("eth0").with("bridge", "vmbr0")).unwrap()
            })
        };
        std::thread::sleep(std::time::Duration::from_millis(200));
        assert!(!worker.is_finished(), "reconcile ran while the lock was held");
        assert_eq!(fs::read_to_string(conf.path()).unwrap(), CONF);

        drop(lock);
        assert!(worker.join().unwrap().changed());
        assert!(conf.descriptor().unwrap().get("eth0").unwrap().contains_key("bridge"));
    }

    #[test]
    fn lock_in_missing_directory_is_reconcile_error() {
        let conf = ContainerConf::new("/nonexistent/vzprov/101.conf");
        assert!(matches!(
            ConfLock::acquire(&conf),
            Err(CoreError::Reconcile { .. })
        ));
    }
}
