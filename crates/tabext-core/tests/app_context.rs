use std::rc::Rc;

use tabext_core::context::AppContext;
use tabext_core::loader::{ExtensionLoader, ScriptLoader};
use tempfile::TempDir;

#[test]
fn app_context_uses_given_config_path() {
    let temp = TempDir::new().unwrap();
    let config = temp.path().join("cfg").join("repositories.toml");

    let ctx = AppContext::new(config.clone()).unwrap();

    assert_eq!(ctx.config_path(), config);
    assert_eq!(ctx.config_store().config_path(), config);
    assert_eq!(ctx.loader().source_suffix(), "tbx");
}

#[test]
fn app_context_bootstraps_on_first_open() {
    let temp = TempDir::new().unwrap();
    let repo_dir = temp.path().join("user-repo");
    let ctx = AppContext::new(temp.path().join("repositories.toml"))
        .unwrap()
        .with_bootstrap_location(repo_dir.to_string_lossy());

    assert!(!ctx.config_store().exists());
    let store = ctx.repository_store().unwrap();

    assert!(ctx.config_store().exists());
    assert_eq!(store.search_order(), vec!["user"]);
    assert_eq!(store.default_repository().unwrap().path(), repo_dir);
    assert!(repo_dir.is_dir());
}

#[test]
fn app_context_builds_repository_with_injected_loader() {
    let temp = TempDir::new().unwrap();
    let loader = Rc::new(ScriptLoader::new());
    let ctx = AppContext::new(temp.path().join("repositories.toml"))
        .unwrap()
        .with_bootstrap_location(temp.path().join("user").to_string_lossy())
        .with_loader(loader.clone());

    let repo = ctx.repository().unwrap();
    assert!(repo.index().is_empty());
    assert_eq!(Rc::strong_count(&loader), 3);
}
