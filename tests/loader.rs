use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

use php_runtime_core::loader::{
    CatalogLocator, LibraryModule, LoadUnit, ManifestLocator, ModuleKind,
};
use php_runtime_core::registry::{Declarations, TypeDesc};
use php_runtime_core::{ApplicationContext, LoadTarget, RuntimeConfig, RuntimeError};

fn unit_with_class(identity: &str, class: &str) -> LoadUnit {
    let mut unit = LoadUnit::new(identity, identity, ModuleKind::Library);
    unit.declarations = Declarations {
        types: vec![TypeDesc::builder(class).module(identity).build()],
        ..Declarations::default()
    };
    unit
}

#[test]
fn concurrent_loads_of_one_library_register_once() {
    let catalog = Arc::new(CatalogLocator::new());
    let built = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&built);
    catalog.register(
        "reports",
        Arc::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(unit_with_class("reports", "Report"))
        }),
    );
    let app = ApplicationContext::builder().locator(catalog.clone()).build();
    let types_before = app.registry().type_count();
    let barrier = Barrier::new(8);

    let modules: Vec<_> = thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|_| {
                scope.spawn(|| {
                    barrier.wait();
                    app.load_library(&LoadTarget::name("reports"), None).expect("load")
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().expect("join")).collect()
    });

    assert!(modules.iter().all(|module| Arc::ptr_eq(module, &modules[0])));
    assert_eq!(catalog.physical_loads(), 1);
    assert_eq!(built.load(Ordering::SeqCst), 1);
    assert_eq!(app.registry().type_count(), types_before + 1);
    assert_eq!(app.loader().expect("loader").module_count(), 1);
}

#[test]
fn library_declarations_are_visible_after_load() {
    let catalog = Arc::new(CatalogLocator::new());
    catalog.register_unit(unit_with_class("billing", "Invoice"));
    let app = ApplicationContext::builder().locator(catalog).build();

    assert!(app.lookup_type("Invoice").is_none());
    let module = app.load_library(&LoadTarget::name("BILLING"), None).expect("load");
    assert_eq!(module.name(), "billing");
    let invoice = app.lookup_type("invoice").expect("declared by library");
    assert_eq!(invoice.module(), Some("billing"));
    assert!(Arc::ptr_eq(&invoice, &module.declarations().types[0]));
}

#[test]
fn missing_library_is_a_configuration_error() {
    let app = ApplicationContext::builder().build();
    let err = app
        .load_library(&LoadTarget::name("nowhere"), None)
        .expect_err("missing");
    match err {
        RuntimeError::Configuration { locator, .. } => assert_eq!(locator, "nowhere"),
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn manifest_libraries_feed_extensions_and_scripts() {
    let dir = tempfile::tempdir().expect("tempdir");
    fs::write(
        dir.path().join("mbstring.toml"),
        r#"
name = "mbstring"
extensions = ["mbstring"]

[[classes]]
name = "MbConverter"

[constants]
MB_CASE_UPPER = 0
"#,
    )
    .expect("write extension manifest");
    fs::write(
        dir.path().join("site.toml"),
        r#"
name = "site"
references = ["mbstring"]
scripts = ["index.php", "admin/panel.php"]
"#,
    )
    .expect("write script library manifest");

    let mut config = RuntimeConfig::default();
    config.loader.lazy_full_reflection = false;
    config.compiler.only_precompiled = true;
    config.compiler.source_root = "/srv/site".into();
    let app = ApplicationContext::builder()
        .config(config)
        .locator(Arc::new(ManifestLocator::new([dir.path()])))
        .build();

    let site = app.load_library(&LoadTarget::name("site"), None).expect("load site");
    assert_eq!(site.kind(), ModuleKind::ScriptLibrary);
    assert!(site.references_resolved());
    assert!(app.lookup_type("MbConverter").is_some());
    assert!(app.lookup_constant("MB_CASE_UPPER").is_some());

    assert_eq!(app.loaded_extensions().expect("extensions"), vec!["mbstring".to_string()]);
    let implementor: LibraryModule = app
        .extension_implementor("MBSTRING")
        .expect("lookup")
        .expect("implementor");
    assert_eq!(implementor.name(), "mbstring");

    let exists = app.resolve_file_existence_predicate();
    assert!(exists(Path::new("index.php")));
    assert!(exists(Path::new("/srv/site/admin/panel.php")));
    assert!(!exists(Path::new("other.php")));
    assert!(!exists(&dir.path().join("site.toml")));
}

#[test]
fn reflection_only_loads_skip_references() {
    let catalog = Arc::new(CatalogLocator::new());
    let mut app_unit = unit_with_class("app", "App");
    app_unit.references = vec![LoadTarget::name("framework")];
    catalog.register_unit(app_unit);
    catalog.register_unit(unit_with_class("framework", "Kernel"));

    let mut config = RuntimeConfig::default();
    config.loader.reflection_only = true;
    config.loader.lazy_full_reflection = false;
    let app = ApplicationContext::builder()
        .config(config)
        .locator(catalog.clone())
        .build();

    let module = app.load_library(&LoadTarget::name("app"), None).expect("load");
    assert!(!module.references_resolved());
    assert_eq!(catalog.physical_loads(), 1);
    assert!(app.lookup_type("Kernel").is_none());
}
