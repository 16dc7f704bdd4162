use std::fs;
use std::net::Ipv4Addr;
use std::path::Path;
use std::sync::Arc;
use vzprov_core::{CoreError, Engine, ProvisionState};
use vzprov_runtime::{CommandResult, MockExecutor, StaticResolver};
use vzprov_schema::{ContainerSpec, Ctid, Invocation, NetifChange, Settings, Verb};

fn settings(conf_dir: &Path) -> Settings {
    let mut s = Settings::default();
    s.backend.conf_dir = conf_dir.to_path_buf();
    s
}

fn resolver() -> StaticResolver {
    StaticResolver::new().with("vm1.example.com", Ipv4Addr::new(10, 0, 0, 5))
}

fn engine(conf_dir: &Path, mock: &Arc<MockExecutor>) -> Engine {
    Engine::new(settings(conf_dir), mock.clone(), Arc::new(resolver()))
}

fn ctid(n: u32) -> Ctid {
    Ctid::new(n).unwrap()
}

#[test]
fn minimal_create_fills_everything_from_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let mock = Arc::new(MockExecutor::new().with_listing(&[]));
    let report = engine(dir.path(), &mock)
        .create(ContainerSpec::new("vm1.example.com"), true)
        .unwrap();

    assert!(report.changed);
    assert_eq!(report.ctid, Some(ctid(1)));
    assert_eq!(report.state, Some(ProvisionState::Done));
    let spec = report.spec.as_ref().unwrap();
    assert_eq!(spec.ipadd.as_deref(), Some("10.0.0.5"));
    assert_eq!(spec.name.as_deref(), Some("vm1.example.com"));

    assert_eq!(
        mock.commands(),
        vec![
            "vzlist -a -j -o ctid".to_owned(),
            "vzctl create 1 --ostemplate centos-6-x86_64 --hostname vm1.example.com \
             --name vm1.example.com --ipadd 10.0.0.5 --diskspace 10G"
                .to_owned(),
            "vzctl set 1 --ram 512M --swap 512M --nameserver 8.8.8.8 --nameserver 8.8.4.4 \
             --onboot yes --save"
                .to_owned(),
        ]
    );
    assert_eq!(report.commands.len(), 3);
}

#[test]
fn allocation_follows_highest_existing_id() {
    let dir = tempfile::tempdir().unwrap();
    let mock = Arc::new(MockExecutor::new().with_listing(&[101, 7, 250]));
    let report = engine(dir.path(), &mock)
        .create(ContainerSpec::new("vm1.example.com"), true)
        .unwrap();
    assert_eq!(report.ctid, Some(ctid(251)));
}

#[test]
fn explicit_values_survive_defaulting() {
    let dir = tempfile::tempdir().unwrap();
    let mock = Arc::new(MockExecutor::new());
    let mut spec = ContainerSpec::new("vm1.example.com");
    spec.ctid = Some(ctid(9));
    spec.ipadd = Some("192.168.5.5".to_owned());
    spec.ram = Some("2G".to_owned());
    spec.onboot = Some(false);

    let report = engine(dir.path(), &mock).create(spec, true).unwrap();
    let commands = mock.commands();
    assert!(
        !commands.iter().any(|c| c.starts_with("vzlist")),
        "an explicit ID must not consult the lister"
    );
    assert!(commands[0].contains("--ipadd 192.168.5.5"));
    assert!(commands[1].contains("--ram 2G"));
    assert!(commands[1].contains("--onboot no"));
    assert_eq!(report.ctid, Some(ctid(9)));
}

#[test]
fn plain_create_issues_exactly_one_command() {
    let dir = tempfile::tempdir().unwrap();
    let mock = Arc::new(MockExecutor::new());
    let invocation = Invocation::from_json(
        r#"{"command":"create","ctid":42,"hostname":"vm1","create_magic":false}"#,
    )
    .unwrap();

    let report = engine(dir.path(), &mock).invoke(&invocation).unwrap();
    assert_eq!(mock.commands(), vec!["vzctl create 42 --hostname vm1".to_owned()]);
    assert_eq!(report.state, Some(ProvisionState::Done));
    assert_eq!(report.ctid, Some(ctid(42)));
}

#[test]
fn plain_create_without_id_aborts_before_any_command() {
    let dir = tempfile::tempdir().unwrap();
    let mock = Arc::new(MockExecutor::new());
    let err = engine(dir.path(), &mock)
        .create(ContainerSpec::new("vm1"), false)
        .unwrap_err();

    assert!(matches!(err.error, CoreError::Validation(_)));
    assert_eq!(err.state, Some(ProvisionState::AbortedEarly));
    assert!(err.commands.is_empty());
    assert!(mock.commands().is_empty());
}

#[test]
fn unresolvable_host_aborts_before_create() {
    let dir = tempfile::tempdir().unwrap();
    let mock = Arc::new(MockExecutor::new().with_listing(&[3]));
    let err = engine(dir.path(), &mock)
        .create(ContainerSpec::new("nowhere.example.com"), true)
        .unwrap_err();

    assert!(matches!(err.error, CoreError::AddressResolution(_)));
    assert_eq!(err.state, Some(ProvisionState::AbortedEarly));
    assert!(mock.commands().iter().all(|c| !c.starts_with("vzctl")));
}

#[test]
fn failed_listing_is_allocation_error() {
    let dir = tempfile::tempdir().unwrap();
    let mock = Arc::new(MockExecutor::new().fail_on("vzlist", 1, "vzlist: not permitted"));
    let err = engine(dir.path(), &mock)
        .create(ContainerSpec::new("vm1.example.com"), true)
        .unwrap_err();

    match &err.error {
        CoreError::Allocation { reason, command } => {
            assert!(reason.contains("not permitted"));
            assert_eq!(command.as_ref().unwrap().status, 1);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(err.state, Some(ProvisionState::AbortedEarly));
}

#[test]
fn backend_failure_stops_with_truncated_transcript() {
    let dir = tempfile::tempdir().unwrap();
    let mock = Arc::new(
        MockExecutor::new()
            .with_listing(&[])
            .fail_on("--ram", 5, "Unable to apply new quota values"),
    );
    let err = engine(dir.path(), &mock)
        .create(ContainerSpec::new("vm1.example.com"), true)
        .unwrap_err();

    assert_eq!(err.state, Some(ProvisionState::Failed));
    assert_eq!(err.commands.len(), 3);
    let failed = err.failed_command().unwrap();
    assert_eq!(failed.status, 5);
    assert!(failed.command.starts_with("vzctl set 1"));
    assert!(err.to_string().contains("Unable to apply new quota values"));
    assert_eq!(err.stderr(), "Unable to apply new quota values");
}

#[test]
fn create_failure_leaves_no_follow_up_commands() {
    let dir = tempfile::tempdir().unwrap();
    let mock = Arc::new(
        MockExecutor::new()
            .with_listing(&[])
            .fail_on("create", 44, "Private area already exists"),
    );
    let err = engine(dir.path(), &mock)
        .create(ContainerSpec::new("vm1.example.com"), true)
        .unwrap_err();

    assert_eq!(err.state, Some(ProvisionState::Failed));
    assert_eq!(mock.commands().len(), 2);
}

const BASE_CONF: &str = "ONBOOT=\"yes\"\nHOSTNAME=\"vm1.example.com\"\n";

/// Mock that creates `<ctid>.conf` on `vzctl create` and adds a NETIF entry
/// on `--netif_add`, like the real backend does.
fn backend_with_conf(conf_dir: &Path, id: u32, existing: &[u32]) -> MockExecutor {
    let conf = conf_dir.join(format!("{id}.conf"));
    let conf2 = conf.clone();
    MockExecutor::new()
        .with_listing(existing)
        .on_with("--netif_add", CommandResult::ok(""), move |_| {
            let mut content = fs::read_to_string(&conf2).unwrap();
            content.push_str(&format!(
                "NETIF=\"ifname=eth0,mac=00:18:51:AA:BB:CC,host_ifname=veth{id}.0\"\n"
            ));
            fs::write(&conf2, content).unwrap();
        })
        .on_with("create", CommandResult::ok("Container private area was created"), move |_| {
            fs::write(&conf, BASE_CONF).unwrap();
        })
}

#[test]
fn netif_change_is_merged_after_backend_add() {
    let dir = tempfile::tempdir().unwrap();
    let mock = Arc::new(backend_with_conf(dir.path(), 6, &[5]));
    let mut spec = ContainerSpec::new("vm1.example.com");
    spec.netif = Some(NetifChange::parse("bridge=vmbr0").unwrap());

    let report = engine(dir.path(), &mock).create(spec, true).unwrap();
    assert_eq!(report.state, Some(ProvisionState::Done));

    let commands = mock.commands();
    assert_eq!(commands.len(), 4);
    assert_eq!(commands[3], "vzctl set 6 --netif_add eth0 --save");
    assert!(
        !commands[1].contains("--ipadd"),
        "a container with a netif change gets no derived address"
    );

    let expected =
        "NETIF=\"ifname=eth0,bridge=vmbr0,host_ifname=veth6.0,mac=00:18:51:AA:BB:CC\"";
    assert_eq!(report.netif.as_deref(), Some(expected));
    let written = fs::read_to_string(dir.path().join("6.conf")).unwrap();
    assert_eq!(written, format!("{BASE_CONF}{expected}\n"));
    assert!(report.stdout().contains("Container private area was created"));
}

#[test]
fn malformed_netif_after_add_fails_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let conf = dir.path().join("1.conf");
    let mock = Arc::new(
        MockExecutor::new()
            .with_listing(&[])
            .on_with("create", CommandResult::ok(""), move |_| {
                fs::write(&conf, "NETIF=\"mac=00:11\"\n").unwrap();
            }),
    );
    let mut spec = ContainerSpec::new("vm1.example.com");
    spec.netif = Some(NetifChange::new("eth1"));

    let err = engine(dir.path(), &mock).create(spec, true).unwrap_err();
    assert!(matches!(err.error, CoreError::Parse { .. }));
    assert_eq!(err.state, Some(ProvisionState::Failed));
    assert_eq!(err.commands.len(), 4);
}

#[test]
fn apply_netif_touches_only_the_named_interface() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("101.conf"),
        "NETIF=\"ifname=eth0,mac=AA;ifname=eth1,mac=BB\"\n",
    )
    .unwrap();
    let mock = Arc::new(MockExecutor::new());
    let e = engine(dir.path(), &mock);

    let report = e
        .apply_netif(ctid(101), NetifChange::new("eth1").with("bridge", "vmbr1"))
        .unwrap();
    assert!(report.changed);
    assert_eq!(
        report.netif.as_deref(),
        Some("NETIF=\"ifname=eth0,mac=AA;ifname=eth1,bridge=vmbr1,mac=BB\"")
    );
    assert!(mock.commands().is_empty());

    let again = e
        .apply_netif(ctid(101), NetifChange::new("eth1").with("bridge", "vmbr1"))
        .unwrap();
    assert!(!again.changed);
}

#[test]
fn apply_netif_defaults_the_interface_name() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("7.conf"), "ONBOOT=\"no\"\n").unwrap();
    let mock = Arc::new(MockExecutor::new());
    let change = NetifChange::parse("bridge=vmbr0").unwrap();
    let report = engine(dir.path(), &mock).apply_netif(ctid(7), change).unwrap();
    assert_eq!(
        report.netif.as_deref(),
        Some("NETIF=\"ifname=eth0,bridge=vmbr0\"")
    );
}

#[test]
fn apply_netif_rejects_values_that_would_break_the_line() {
    let dir = tempfile::tempdir().unwrap();
    let original = "NETIF=\"ifname=eth0,mac=AA\"\n";
    let conf = dir.path().join("5.conf");
    fs::write(&conf, original).unwrap();
    let mock = Arc::new(MockExecutor::new());
    let e = engine(dir.path(), &mock);

    for value in ["vmbr0,extra", "vmbr0;ifname=eth9"] {
        let err = e
            .apply_netif(ctid(5), NetifChange::new("eth0").with("bridge", value))
            .unwrap_err();
        assert!(matches!(err.error, CoreError::Validation(_)), "{value}");
        assert_eq!(fs::read_to_string(&conf).unwrap(), original);
    }

    let report = e
        .apply_netif(ctid(5), NetifChange::new("eth0").with("bridge", "vmbr0"))
        .unwrap();
    assert_eq!(
        report.netif.as_deref(),
        Some("NETIF=\"ifname=eth0,bridge=vmbr0,mac=AA\"")
    );
}

#[test]
fn unstorable_netif_change_aborts_before_create() {
    let dir = tempfile::tempdir().unwrap();
    let mock = Arc::new(backend_with_conf(dir.path(), 1, &[]));
    let mut spec = ContainerSpec::new("vm1.example.com");
    spec.netif = Some(NetifChange::new("eth0").with("bridge", "vmbr0,extra"));

    let err = engine(dir.path(), &mock).create(spec, true).unwrap_err();
    assert!(matches!(err.error, CoreError::Validation(_)));
    assert_eq!(err.state, Some(ProvisionState::AbortedEarly));
    assert!(mock.commands().iter().all(|c| !c.starts_with("vzctl")));
    assert!(!dir.path().join("1.conf").exists());
}

#[test]
fn unnamed_netif_change_without_default_ifname_aborts() {
    let dir = tempfile::tempdir().unwrap();
    let mut settings = settings(dir.path());
    settings.defaults.ifname.clear();
    let mock = Arc::new(MockExecutor::new().with_listing(&[]));
    let e = Engine::new(settings, mock.clone(), Arc::new(resolver()));

    let mut spec = ContainerSpec::new("vm1.example.com");
    spec.netif = Some(NetifChange::parse("bridge=vmbr0").unwrap());
    let err = e.create(spec, true).unwrap_err();

    assert!(matches!(err.error, CoreError::Validation(_)));
    assert_eq!(err.state, Some(ProvisionState::AbortedEarly));
    assert_eq!(mock.commands(), vec!["vzlist -a -j -o ctid".to_owned()]);
}

#[test]
fn pass_through_verbs_issue_one_command() {
    let dir = tempfile::tempdir().unwrap();
    let cases = [
        (Verb::Start, None, "vzctl start 101"),
        (Verb::Stop, None, "vzctl stop 101"),
        (Verb::Restart, None, "vzctl restart 101"),
        (Verb::Destroy, None, "vzctl destroy 101"),
        (Verb::Mount, None, "vzctl mount 101"),
        (Verb::Unmount, None, "vzctl umount 101"),
        (Verb::Status, None, "vzctl status 101"),
        (Verb::Set, Some("--cpus 2"), "vzctl set 101 --cpus 2 --save"),
        (Verb::Set, Some("--cpus 2 --save"), "vzctl set 101 --cpus 2 --save"),
        (Verb::Exec, Some("uptime"), "vzctl exec 101 uptime"),
        (Verb::Exec2, Some("ls -l /root"), "vzctl exec2 101 'ls -l /root'"),
    ];
    for (verb, args, expected) in cases {
        let mock = Arc::new(MockExecutor::new());
        let report = engine(dir.path(), &mock)
            .pass_through(verb, Some(ctid(101)), args)
            .unwrap();
        assert_eq!(mock.commands(), vec![expected.to_owned()], "{verb}");
        assert_eq!(report.changed, verb != Verb::Status, "{verb}");
        assert_eq!(report.operation, verb.as_str());
        assert!(report.state.is_none());
    }
}

#[test]
fn pass_through_failure_is_reported_verbatim() {
    let dir = tempfile::tempdir().unwrap();
    let mock = Arc::new(MockExecutor::new().on(
        "status",
        CommandResult {
            status: 3,
            stdout: "CTID 101 deleted unmounted down".to_owned(),
            stderr: "warning".to_owned(),
        },
    ));
    let invocation = Invocation::from_json(r#"{"command":"status","ctid":101}"#).unwrap();
    let err = engine(dir.path(), &mock).invoke(&invocation).unwrap_err();
    let cmd = err.failed_command().unwrap();
    assert_eq!(cmd.stdout, "CTID 101 deleted unmounted down");
    assert_eq!(cmd.status, 3);
    assert!(err.state.is_none());
}

#[test]
fn list_returns_backend_ids() {
    let dir = tempfile::tempdir().unwrap();
    let mock = Arc::new(MockExecutor::new().with_listing(&[3, 1, 2]));
    let ids: Vec<u32> = engine(dir.path(), &mock)
        .list()
        .unwrap()
        .into_iter()
        .map(Ctid::get)
        .collect();
    assert_eq!(ids, vec![3, 1, 2]);
}

#[test]
fn report_serializes_for_automation() {
    let dir = tempfile::tempdir().unwrap();
    let mock = Arc::new(MockExecutor::new().with_listing(&[]));
    let report = engine(dir.path(), &mock)
        .create(ContainerSpec::new("vm1.example.com"), true)
        .unwrap();
    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["changed"], true);
    assert_eq!(json["ctid"], 1);
    assert_eq!(json["state"], "done");
    assert_eq!(json["commands"].as_array().unwrap().len(), 3);
    assert!(json.get("netif").is_none());
}
