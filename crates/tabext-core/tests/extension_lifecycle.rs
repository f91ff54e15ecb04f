mod support;

use tabext_core::error::ExtensionError;
use tabext_core::extension::parse_time;
use tabext_core::repository::ExtensionState;
use tabext_core::table::{Table, Value};
use tabext_core::types::DEFAULT_COLLECTION;

use support::{CIRCUMFERENCE_FROM_DIAMETER, CIRCUMFERENCE_FROM_RADIUS, workspace};

#[test]
fn install_remove_then_list_is_empty() {
    let ws = workspace();
    let mut repo = ws.repository();
    let src = ws.sources("circ", &[("circ.tbx", CIRCUMFERENCE_FROM_RADIUS)]);

    let installed = repo
        .install(&["calculate_circumference_from_radius"], &src, Some("geo"), None)
        .unwrap();
    assert_eq!(installed.len(), 1);
    assert!(repo.is_known("geo", "calculate_circumference_from_radius"));
    assert!(repo.list_all().contains("There is 1 extension installed:"));

    repo.remove("geo.calculate_circumference_from_radius").unwrap();
    assert!(!repo.is_known("geo", "calculate_circumference_from_radius"));
    assert!(repo.list_all().contains("No extensions are installed"));
    assert!(!ws.repo_path("user").join("geo").exists());

    let err = repo.remove("geo.calculate_circumference_from_radius").unwrap_err();
    assert!(matches!(err, ExtensionError::NotFound { .. }));
}

#[test]
fn path_like_collection_is_refused_before_touching_disk() {
    let ws = workspace();
    let mut repo = ws.repository();
    let src = ws.sources("circ", &[("circ.tbx", CIRCUMFERENCE_FROM_RADIUS)]);
    let outside = ws.repo_path("outside");

    for collection in [outside.to_string_lossy().to_string(), "geo/../..".to_string()] {
        let err = repo
            .install(
                &["calculate_circumference_from_radius"],
                &src,
                Some(&collection),
                None,
            )
            .unwrap_err();
        assert!(matches!(err, ExtensionError::InvalidExtensionName(_)));
    }

    let err = repo
        .install(&["../calculate_circumference_from_radius"], &src, None, None)
        .unwrap_err();
    assert!(matches!(err, ExtensionError::InvalidExtensionName(_)));

    assert!(!outside.exists());
    assert_eq!(std::fs::read_dir(ws.repo_path("user")).unwrap().count(), 0);
    assert!(repo.list_all().contains("No extensions are installed"));
}

#[test]
fn install_several_names_from_one_location() {
    let ws = workspace();
    let mut repo = ws.repository();
    let src = ws.sources(
        "circles",
        &[
            ("radius.tbx", CIRCUMFERENCE_FROM_RADIUS),
            ("diameter.tbx", CIRCUMFERENCE_FROM_DIAMETER),
        ],
    );

    repo.install(
        &[
            "calculate_circumference_from_radius",
            "calculate_circumference_from_diameter",
        ],
        &src,
        Some("circles"),
        None,
    )
    .unwrap();

    let unit = repo.unit("circles.calculate_circumference_from_diameter").unwrap();
    assert_eq!(unit.manifest().unwrap().extension_file, "diameter.tbx");
    assert_eq!(repo.index().len(), 2);
}

#[test]
fn failing_name_keeps_earlier_siblings() {
    let ws = workspace();
    let mut repo = ws.repository();
    let src = ws.sources("circ", &[("circ.tbx", CIRCUMFERENCE_FROM_RADIUS)]);

    let err = repo
        .install(
            &["calculate_circumference_from_radius", "not_defined_anywhere"],
            &src,
            None,
            None,
        )
        .unwrap_err();

    assert!(matches!(err, ExtensionError::DefinitionNotFound { ref name, .. } if name == "not_defined_anywhere"));
    assert!(repo.is_known(DEFAULT_COLLECTION, "calculate_circumference_from_radius"));
    assert!(!repo.is_known(DEFAULT_COLLECTION, "not_defined_anywhere"));
    assert!(!ws.repo_path("user").join(DEFAULT_COLLECTION).join("not_defined_anywhere").exists());
}

#[test]
fn install_rejects_bad_names_and_locations() {
    let ws = workspace();
    let mut repo = ws.repository();
    let src = ws.sources("circ", &[("circ.tbx", CIRCUMFERENCE_FROM_RADIUS)]);

    let err = repo.install(&["a.b.c"], &src, None, None).unwrap_err();
    assert!(matches!(err, ExtensionError::InvalidExtensionName(_)));

    let missing = ws.tmp.path().join("nowhere").to_string_lossy().to_string();
    let err = repo.install(&["x"], &missing, None, None).unwrap_err();
    assert!(matches!(err, ExtensionError::InvalidLocation(_)));

    let err = repo.install(&["x"], &src, None, Some("ghost")).unwrap_err();
    assert!(matches!(err, ExtensionError::NotFound { .. }));
    assert!(repo.index().is_empty());
}

#[test]
fn disable_and_enable_are_idempotent() {
    let ws = workspace();
    let mut repo = ws.repository();
    let src = ws.sources("circ", &[("circ.tbx", CIRCUMFERENCE_FROM_RADIUS)]);
    repo.install(&["calculate_circumference_from_radius"], &src, None, None)
        .unwrap();

    let run = |repo: &tabext_core::repository::ExtensionRepository| {
        let mut table = Table::new().with_column("radius", vec![0.5]);
        let result = repo
            .resolve(DEFAULT_COLLECTION, "calculate_circumference_from_radius")
            .unwrap()
            .call(&mut table, &[])
            .unwrap();
        (result, table.column("circumference").map(<[f64]>::to_vec))
    };
    let (_, original) = run(&repo);
    assert!(original.is_some());

    repo.disable("calculate_circumference_from_radius").unwrap();
    let manifest_once = repo
        .unit("calculate_circumference_from_radius")
        .unwrap()
        .manifest()
        .unwrap();
    repo.disable("calculate_circumference_from_radius").unwrap();
    let manifest_twice = repo
        .unit("calculate_circumference_from_radius")
        .unwrap()
        .manifest()
        .unwrap();
    assert!(!manifest_once.enabled);
    assert_eq!(manifest_once, manifest_twice);
    assert_eq!(run(&repo), (Value::Nil, None));
    assert!(repo.list_all().contains("(disabled)"));

    repo.enable("calculate_circumference_from_radius").unwrap();
    let (_, restored) = run(&repo);
    assert_eq!(restored, original);
}

#[test]
fn enable_unknown_extension_is_not_found() {
    let ws = workspace();
    let mut repo = ws.repository();
    let err = repo.enable("geo.nothing").unwrap_err();
    assert!(matches!(err, ExtensionError::NotFound { ref name, .. } if name == "geo.nothing"));
}

#[test]
fn reinstall_keeps_identity_and_refreshes_files() {
    let ws = workspace();
    let mut repo = ws.repository();
    let src = ws.sources("circ", &[("circ.tbx", CIRCUMFERENCE_FROM_RADIUS)]);
    repo.install(&["calculate_circumference_from_radius"], &src, Some("geo"), None)
        .unwrap();

    let before = repo
        .unit("geo.calculate_circumference_from_radius")
        .unwrap()
        .manifest()
        .unwrap();

    std::fs::write(
        std::path::Path::new(&src).join("circ.tbx"),
        "fn calculate_circumference_from_radius(table):\n    return 42\n",
    )
    .unwrap();
    repo.reinstall("geo.calculate_circumference_from_radius").unwrap();

    let unit = repo.unit("geo.calculate_circumference_from_radius").unwrap();
    let after = unit.manifest().unwrap();
    assert_eq!(after.install_collection, "geo");
    assert_eq!(after.extension_name, "calculate_circumference_from_radius");
    assert_eq!(after.install_repository, before.install_repository);
    assert_eq!(after.install_location, before.install_location);
    assert!(!unit.is_earlier_than(&before.install_time).unwrap());
    assert!(parse_time(&after.install_time).unwrap() >= parse_time(&before.install_time).unwrap());

    let value = unit
        .get_callable()
        .unwrap()
        .call(&mut Table::new(), &[])
        .unwrap();
    assert_eq!(value, Value::Number(42.0));
}

#[test]
fn show_and_summaries_describe_extensions() {
    let ws = workspace();
    let mut repo = ws.repository();
    let src = ws.sources("circ", &[("circ.tbx", CIRCUMFERENCE_FROM_RADIUS)]);
    repo.install(&["calculate_circumference_from_radius"], &src, Some("geo"), None)
        .unwrap();

    let details = repo.show("geo.calculate_circumference_from_radius").unwrap();
    assert_eq!(details.repository, "user");
    assert!(details.enabled);
    assert!(details.doc.starts_with("Circumference of a circle from its radius."));
    assert!(details.doc.ends_with(
        "USAGE: table.extensions.geo.calculate_circumference_from_radius(col=\"radius\")"
    ));
    assert!(details.to_string().contains("repository: user"));

    let summaries = repo.summaries();
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].collection.as_deref(), Some("geo"));
    assert_eq!(summaries[0].state, ExtensionState::Ready);

    let json = serde_json::to_value(&summaries).unwrap();
    assert_eq!(json[0]["state"], "ready");
    assert_eq!(json[0]["name"], "calculate_circumference_from_radius");
}

#[test]
fn list_all_groups_by_collection() {
    let ws = workspace();
    let mut repo = ws.repository();
    let src = ws.sources(
        "circles",
        &[
            ("radius.tbx", CIRCUMFERENCE_FROM_RADIUS),
            ("diameter.tbx", CIRCUMFERENCE_FROM_DIAMETER),
        ],
    );
    repo.install(&["calculate_circumference_from_radius"], &src, None, None)
        .unwrap();
    repo.install(&["calculate_circumference_from_diameter"], &src, Some("geo"), None)
        .unwrap();

    let listing = repo.list_all();
    let expected = format!(
        "tabext v{}\n\
         There are 2 extensions installed:\n\
         \n  table.extensions.calculate_circumference_from_radius(col=\"radius\")\n\
         \nCollection: geo\n  table.extensions.geo.calculate_circumference_from_diameter(col=\"diameter\")\n\
         \nFor help on individual extensions, use tabext show <extension name>\n",
        env!("CARGO_PKG_VERSION")
    );
    assert_eq!(listing, expected);
}
