use std::collections::BTreeMap;
use std::fs;

use anyhow::Result;
use cmk_werks::stash::id_ranges;
use cmk_werks::{
    load_werk, load_werk_file, reserve_ids, Compatibility, Stash, WerkClass, WerkParseResult,
    WerksConfig,
};

use crate::mocks::WerkRepo;
use crate::test_setup;

fn new_werk(id: u32, config: &WerksConfig) -> Result<WerkParseResult> {
    let mut metadata = BTreeMap::new();
    for (key, value) in [
        ("id", id.to_string()),
        ("title", "Proxmox VE: Fix missing backup age on lxc containers".to_string()),
        ("class", "fix".to_string()),
        ("edition", "cre".to_string()),
        ("component", "checks".to_string()),
        ("level", "1".to_string()),
        ("compatible", "yes".to_string()),
        ("date", "2024-03-02T12:00:00+00:00".to_string()),
        ("version", config.current_version()?.to_string()),
    ] {
        metadata.insert(key.to_string(), value);
    }
    Ok(WerkParseResult {
        metadata,
        description: "The backup status service went UNKNOWN for containers.".to_string(),
    })
}

#[test]
fn test_reserve_write_and_reload_werk() -> Result<()> {
    test_setup!();
    let repo = WerkRepo::new("2.3.0p7")?;
    let werks = repo.werks_dir();
    let config = WerksConfig::load(&repo.werks_path())?;
    assert_eq!(config.current_version()?, "2.3.0p7");

    let ranges = id_ranges(&config.project).ok_or_else(|| anyhow::anyhow!("no id range"))?;
    let (first_free, reserved) = reserve_ids(ranges, werks.first_free()?, 3)?;
    assert_eq!(reserved, vec![15010, 15011, 15012]);
    werks.save_first_free(first_free)?;
    assert_eq!(werks.first_free()?, 15013);

    let stash_path = repo.root().join("stash.json");
    let mut stash = Stash::load(&stash_path)?;
    for id in reserved {
        stash.add_id(id, &config.project);
    }
    let id = stash.pick_id(&config.project)?;
    assert_eq!(id, 15010);

    let path = werks.new_werk_path(id);
    werks.save(&path, id, &new_werk(id, &config)?)?;
    stash.free_id(id);
    stash.save(&stash_path)?;
    assert_eq!(werks.last()?, id);

    let written = fs::read_to_string(&path)?;
    assert!(written.starts_with("[//]: # (werk v2)\n# Proxmox VE: Fix missing backup age"));
    assert!(written.contains("\nkey | value\n--- | ---\ndate | 2024-03-02T12:00:00+00:00\nversion | 2.3.0p7\n"));

    let werk = load_werk_file(&written, "15010.md", Some(&config))?;
    assert_eq!(werk.class, WerkClass::Fix);
    assert_eq!(werk.compatible, Compatibility::Yes);

    let all = werks.load_all()?;
    assert_eq!(all.keys().copied().collect::<Vec<_>>(), vec![15010]);

    let stash = Stash::load(&stash_path)?;
    assert_eq!(stash.count(), 2);
    assert_eq!(stash.pick_id("cmk")?, 15011);
    Ok(())
}

#[test]
fn test_legacy_werk_is_rewritten_as_markdown() -> Result<()> {
    test_setup!();
    let repo = WerkRepo::new("2.3.0p7")?;
    let werks = repo.werks_dir();
    repo.write(
        "9001",
        "Title: Agent updater ignores proxy settings\n\
         Class: fix\n\
         Compatible: incomp\n\
         Component: checks\n\
         Date: 1704963790\n\
         Edition: cee\n\
         Knowledge: undoc\n\
         Level: 2\n\
         State: unknown\n\
         Version: 2.3.0b1\n\
         \n\
         Set the proxy again after updating.\n",
    )?;

    let stored = werks.load(9001)?;
    assert!(!stored.is_markdown());
    let werk = load_werk(&stored.content, None)?;
    assert_eq!(werk.compatible, Compatibility::No);

    let path = werks.new_werk_path(9001);
    werks.save(&path, stored.id, &stored.content)?;
    fs::remove_file(&stored.path)?;

    let converted = werks.load(9001)?;
    assert!(converted.is_markdown());
    assert_eq!(converted.content.get("date"), Some("2024-01-11T09:03:10+00:00"));
    assert_eq!(converted.content.get("knowledge"), None);
    assert_eq!(converted.content.description, "Set the proxy again after updating.");
    assert_eq!(load_werk(&converted.content, None)?, werk);
    Ok(())
}

#[test]
fn test_config_rejects_unknown_component() -> Result<()> {
    test_setup!();
    let repo = WerkRepo::new("2.3.0p7")?;
    let config = WerksConfig::load(&repo.werks_path())?;
    repo.add_werk(
        15020,
        "Reporting of an unknown component",
        &[
            ("date", "2024-03-01T10:00:00+00:00"),
            ("version", "2.3.0p7"),
            ("class", "feature"),
            ("edition", "cre"),
            ("component", "reporting"),
            ("level", "1"),
            ("compatible", "yes"),
        ],
        "Only configured for the enterprise edition.",
    )?;

    let werks = repo.werks_dir();
    let stored = werks.load(15020)?;
    assert!(load_werk(&stored.content, None).is_ok());
    assert!(load_werk(&stored.content, Some(&config)).is_ok());

    let mut foreign = stored.content.clone();
    foreign.metadata.insert("component".to_string(), "kubernetes".to_string());
    let err = load_werk(&foreign, Some(&config)).unwrap_err();
    assert!(err.to_string().contains("component"));
    Ok(())
}
