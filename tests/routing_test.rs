use rask_log_router::transport::{
    FilterOverrides, HistorySettings, HistoryTransport, PropertyError, Transport, TransportFactory,
};
use rask_log_router::{
    EnabledPolicy, GroupSpec, LogArg, Logger, LoggerConfig, LoggerOptions, RouterError, can_log,
};
use serde_json::json;
use std::sync::Arc;

fn logger_with_history(enabled: EnabledPolicy, disabled: Vec<GroupSpec>) -> (Logger, Arc<HistoryTransport>) {
    let history = Arc::new(HistoryTransport::default());
    let mut logger = Logger::new(LoggerOptions::default());
    logger.set_groups_enabled(enabled).set_groups_disabled(disabled);
    logger.transports_mut().add(history.clone());
    (logger, history)
}

#[test]
fn test_can_log_policies() {
    for group in ["api", "db:pool", "", "error"] {
        assert!(can_log(group, &EnabledPolicy::All, &[]));
    }

    assert!(can_log("error:db", &EnabledPolicy::Nothing, &[]));
    assert!(can_log("warning", &EnabledPolicy::Nothing, &[]));
    assert!(!can_log("info", &EnabledPolicy::Nothing, &[]));

    let literal = EnabledPolicy::Groups(vec![GroupSpec::literal("group1")]);
    assert!(can_log("group1:subgroup1", &literal, &[]));
    assert!(!can_log("group2", &literal, &[]));
    assert!(!can_log("some-group-group1", &literal, &[]));

    let pattern = EnabledPolicy::Groups(vec![GroupSpec::parse("/^group1/").unwrap()]);
    assert!(can_log("group1:subgroup1", &pattern, &[]));
    assert!(!can_log("other", &pattern, &[]));

    assert!(!can_log("error:x", &EnabledPolicy::All, &[GroupSpec::literal("error")]));
}

#[test]
fn test_literal_prefix_is_not_segment_aware() {
    let enabled = EnabledPolicy::Groups(vec![GroupSpec::literal("group1")]);
    assert!(can_log("group10", &enabled, &[]));
}

#[test]
fn test_enabled_list_delivers_by_prefix() {
    let (logger, history) = logger_with_history(EnabledPolicy::Groups(vec![GroupSpec::literal("a:b")]), Vec::new());

    assert!(logger.log("a:b", "exact", []).is_some());
    assert!(logger.log("a:b:c", "nested", []).is_some());
    assert!(logger.log("a", "parent", []).is_none());

    assert_eq!(history.groups(), vec!["a:b", "a:b:c"]);
}

#[test]
fn test_disabled_list_blocks_delivery() {
    let (logger, history) = logger_with_history(EnabledPolicy::All, vec![GroupSpec::literal("secret")]);

    assert!(logger.log("secret:leak", "hidden", []).is_none());
    assert!(logger.log("public", "shown", []).is_some());

    assert!(history.history("secret:leak").is_empty());
    assert_eq!(history.history("public")[0].message, "shown");
}

#[test]
fn test_transport_override_wins_over_global_policy() {
    let quiet = Arc::new(HistoryTransport::with_filters(
        HistorySettings::default(),
        FilterOverrides::new(Some(EnabledPolicy::Nothing), None),
    ));
    let loud = Arc::new(HistoryTransport::default());

    let mut logger = Logger::new(LoggerOptions::default());
    logger.transports_mut().add(quiet.clone());
    logger.transports_mut().add(loud.clone());

    logger.log("api:users", "created", [LogArg::property("id", 1)]);
    logger.log("warn:disk", "almost full", []);

    assert_eq!(quiet.groups(), vec!["warn:disk"]);
    assert_eq!(loud.groups(), vec!["api:users", "warn:disk"]);

    // Clearing the override falls back to the global policy
    logger
        .transports()
        .get_key("History")
        .unwrap()
        .set_property("groups_enabled", json!(null))
        .unwrap();
    logger.log("api:users", "updated", []);
    assert_eq!(quiet.history("api:users").len(), 1);
}

#[test]
fn test_records_are_shared_between_transports() {
    let first = Arc::new(HistoryTransport::default());
    let second = Arc::new(HistoryTransport::default());
    let mut logger = Logger::new(LoggerOptions::default());
    logger.transports_mut().add(first.clone());
    logger.transports_mut().add(second.clone());

    let record = logger
        .log("api", "payload", [LogArg::property("user", "ada"), LogArg::value(42)])
        .unwrap();

    assert!(Arc::ptr_eq(&record, &first.history("api")[0]));
    assert!(Arc::ptr_eq(&record, &second.history("api")[0]));
    assert_eq!(record.properties["user"], json!("ada"));
    assert_eq!(record.properties["_argument1"], json!(42));
}

#[test]
fn test_bulk_properties_on_selection() {
    let mut logger = Logger::new(LoggerOptions::default());
    logger.transports_mut().add(Arc::new(HistoryTransport::default()));
    logger.transports_mut().add(Arc::new(HistoryTransport::default()));

    let selection = logger.transports().get("history");
    assert_eq!(selection.keys(), vec!["History", "History1"]);

    selection.set_property("history_size", json!(2)).unwrap();
    assert_eq!(selection.get_property("history_size"), vec![Some(json!(2)), Some(json!(2))]);

    let updates = json!({ "history_size": 3, "groups_disabled": ["noisy"] });
    selection.set_properties(updates.as_object().unwrap()).unwrap();
    assert_eq!(selection.get_property("history_size"), vec![Some(json!(3)), Some(json!(3))]);
    assert!(logger.log("noisy:loop", "spam", []).is_none());

    assert!(selection.set_property("no_such_option", json!(true)).is_err());
}

#[test]
fn test_history_size_keeps_most_recent() {
    let history = Arc::new(HistoryTransport::new(HistorySettings {
        history_size: 2,
        store_everything: false,
    }));
    let mut logger = Logger::new(LoggerOptions::default());
    logger.transports_mut().add(history.clone());

    for n in 0..5 {
        logger.log("jobs", format!("run {n}"), []);
    }

    let messages: Vec<String> = history.history("jobs").iter().map(|r| r.message.clone()).collect();
    assert_eq!(messages, vec!["run 3", "run 4"]);
}

#[test]
fn test_logger_from_toml_config() {
    let config = LoggerConfig::from_toml_str(
        r#"
        groups_enabled = ["api", "/^db:/"]
        groups_disabled = ["api:health"]

        [[transports]]
        type = "history"

        [[transports]]
        type = "History"
        store_everything = true
        "#,
    )
    .unwrap();

    let logger = Logger::from_config_with_factory(&config, &TransportFactory::default()).unwrap();
    assert_eq!(logger.transports().keys(), vec!["History", "History1"]);

    assert!(logger.can_log("db:pool"));
    assert!(logger.can_log("cache:miss"));

    // The global deny-list still applies to the store-everything transport
    assert!(logger.log("api:health", "ok", []).is_none());

    let strict = logger.transports().get_key("History").unwrap();
    let everything = logger.transports().get_key("History1").unwrap();
    assert!(!strict.accepts("cache:miss", &config.groups_enabled, &config.groups_disabled));
    assert!(everything.accepts("cache:miss", &config.groups_enabled, &config.groups_disabled));
}

#[test]
fn test_removing_transports() {
    let mut logger = Logger::new(LoggerOptions::default());
    for _ in 0..3 {
        logger.transports_mut().add(Arc::new(HistoryTransport::default()));
    }
    assert_eq!(logger.transports().keys(), vec!["History", "History1", "History2"]);

    assert_eq!(logger.transports_mut().remove("History", Some(1)), vec!["History1"]);
    assert_eq!(logger.transports().keys(), vec!["History", "History2"]);

    // A later registration does not reuse a key still in use
    let key = logger.transports_mut().add(Arc::new(HistoryTransport::default()));
    assert_eq!(key, "History3");

    let removed = logger.transports_mut().remove("History", None);
    assert_eq!(removed.len(), 3);
    assert!(logger.transports().is_empty());
    assert!(!logger.can_log("anything"));
}

fn quiet_history(logger: &Logger, size: u64) -> Result<(), RouterError> {
    let selection = logger.transports().get("history");
    selection.set_property("history_size", json!(size))?;
    selection.set_property("groups_disabled", json!(["noisy"]))?;
    Ok(())
}

#[test]
fn test_property_errors_convert_to_router_error() {
    let mut logger = Logger::new(LoggerOptions::default());
    let history = Arc::new(HistoryTransport::default());
    logger.transports_mut().add(history.clone());

    quiet_history(&logger, 5).unwrap();
    assert_eq!(history.property("history_size"), Some(json!(5)));
    assert!(logger.log("noisy:loop", "spam", []).is_none());

    let err = logger
        .transports()
        .get("history")
        .set_property("history_size", json!(-1))
        .map(|_| ())
        .map_err(RouterError::from)
        .unwrap_err();
    assert!(matches!(
        err,
        RouterError::Property(PropertyError::Invalid { ref key, .. }) if key == "history_size"
    ));
    assert!(err.to_string().starts_with("Property error: "));
}
