use super::*;
use super::test_helpers::FakeBackend;
use crate::session::{AuthState, AuthStatus};
use crate::storage::{TOKEN_KEY, TokenStore, USER_KEY};
use crate::types::{LoginData, RegisterData, User};
use tokio::time::{Duration, timeout};

fn asha() -> User {
    User { id: "1".into(), name: "Asha".into(), email: "a@x.com".into(), phone: None }
}

fn ravi() -> User {
    User { id: "2".into(), name: "Ravi".into(), email: "r@x.com".into(), phone: Some("98470".into()) }
}

async fn wait_for_profile_calls(api: &FakeBackend, n: usize) {
    timeout(Duration::from_millis(500), async {
        while api.profile_calls() < n {
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("profile fetch never issued");
}

async fn wait_until(root: &ClientRoot, pred: impl FnMut(&AuthState) -> bool) -> AuthState {
    let mut rx = root.session().subscribe();
    timeout(Duration::from_millis(500), rx.wait_for(pred))
        .await
        .expect("session never reached expected state")
        .unwrap()
        .clone()
}

// =============================================================================
// ChannelNavigator
// =============================================================================

#[test]
fn channel_navigator_records_reload_path() {
    let (navigator, mut rx) = ChannelNavigator::new();
    navigator.hard_reload("/");
    assert_eq!(rx.try_recv().unwrap(), Navigation { path: "/".into() });
}

#[test]
fn channel_navigator_tolerates_dropped_receiver() {
    let (navigator, rx) = ChannelNavigator::new();
    drop(rx);
    navigator.hard_reload("/");
}

// =============================================================================
// ClientRoot
// =============================================================================

#[tokio::test]
async fn fresh_boot_without_token_is_logged_out() {
    let root = ClientRoot::boot(SharedStorage::in_memory(), Arc::new(FakeBackend::default())).await;
    let state = root.session().state();
    assert_eq!(state.status, AuthStatus::Unauthenticated);
    assert!(!state.loading);
}

#[tokio::test]
async fn stale_cache_scenario_resolves_to_cached_user() {
    let shared = SharedStorage::in_memory();
    let seed = shared.open_tab();
    seed.set(TOKEN_KEY, "abc").unwrap();
    seed.set(USER_KEY, r#"{"id":"1","name":"Asha","email":"a@x.com"}"#).unwrap();
    let api = Arc::new(FakeBackend::default());
    api.set_profile_down(true);

    let root = ClientRoot::boot(shared, api).await;

    let state = root.session().state();
    assert!(state.is_authenticated());
    assert_eq!(state.user().unwrap().name, "Asha");
}

#[tokio::test]
async fn login_in_one_tab_authenticates_the_other() {
    let shared = SharedStorage::in_memory();
    let api: Arc<FakeBackend> = Arc::new(FakeBackend::with_account(asha(), "pw"));
    let tab_a = ClientRoot::boot(shared.clone(), Arc::clone(&api) as Arc<dyn AuthApi>).await;
    let tab_b = ClientRoot::boot(shared, api).await;
    assert_ne!(tab_a.tab(), tab_b.tab());

    tab_a.session().login(&LoginData::with_email("a@x.com", "pw")).await.unwrap();

    let state = wait_until(&tab_b, |s| s.is_authenticated() && !s.loading).await;
    assert_eq!(state.user(), Some(&asha()));
}

#[tokio::test]
async fn login_in_another_tab_during_boot_check_wins() {
    let shared = SharedStorage::in_memory();
    let api: Arc<FakeBackend> = Arc::new(FakeBackend::with_account(asha(), "pw"));
    let other_tab = shared.open_tab();
    other_tab.set(TOKEN_KEY, &api.issue_token(&asha())).unwrap();
    other_tab.set(USER_KEY, &serde_json::to_string(&asha()).unwrap()).unwrap();

    let release = api.hold_profile();
    let boot = tokio::spawn(ClientRoot::boot(shared, Arc::clone(&api) as Arc<dyn AuthApi>));
    wait_for_profile_calls(&api, 1).await;

    other_tab.set(TOKEN_KEY, &api.issue_token(&ravi())).unwrap();
    other_tab.set(USER_KEY, &serde_json::to_string(&ravi()).unwrap()).unwrap();
    wait_for_profile_calls(&api, 2).await;
    release.send(false).unwrap();

    let root = boot.await.unwrap();
    let state = wait_until(&root, |s| s.user() == Some(&ravi()) && !s.loading).await;
    assert!(state.is_authenticated());
    let cached: User = serde_json::from_str(&other_tab.get(USER_KEY).unwrap().unwrap()).unwrap();
    assert_eq!(cached, ravi());
}

#[tokio::test]
async fn register_then_auto_login_authenticates_new_account() {
    let root = ClientRoot::boot(SharedStorage::in_memory(), Arc::new(FakeBackend::default())).await;
    let data = RegisterData {
        name: "Ravi".into(),
        email: "r@x.com".into(),
        phone: Some("98470".into()),
        password: "secret".into(),
    };

    let user = root.session().register(&data).await.unwrap();

    assert_eq!(user.email, "r@x.com");
    assert_eq!(root.session().state().user().map(|u| u.name.as_str()), Some("Ravi"));
    assert!(root.storage().get(TOKEN_KEY).unwrap().is_some());
}

#[tokio::test]
async fn logout_then_reload_boots_clean_root() {
    let shared = SharedStorage::in_memory();
    let api: Arc<FakeBackend> = Arc::new(FakeBackend::with_account(asha(), "pw"));
    let mut root = ClientRoot::boot(shared.clone(), Arc::clone(&api) as Arc<dyn AuthApi>).await;
    let other = ClientRoot::boot(shared, api).await;
    root.session().login(&LoginData::with_email("a@x.com", "pw")).await.unwrap();
    wait_until(&other, AuthState::is_authenticated).await;

    root.session().logout();
    let navigation = root.take_navigation().expect("logout should request a reload");
    assert_eq!(navigation.path, "/");

    let old_tab = root.tab();
    let root = root.reload().await;
    assert_ne!(root.tab(), old_tab);
    assert_eq!(root.session().state().status, AuthStatus::Unauthenticated);
    wait_until(&other, |s| s.status == AuthStatus::Unauthenticated && !s.loading).await;
}

#[tokio::test]
async fn file_storage_session_survives_reboot() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("storage.json");
    let api: Arc<FakeBackend> = Arc::new(FakeBackend::with_account(asha(), "pw"));

    let root = ClientRoot::boot(SharedStorage::file(&path), Arc::clone(&api) as Arc<dyn AuthApi>).await;
    root.session().login(&LoginData::with_email("a@x.com", "pw")).await.unwrap();
    drop(root);

    let root = ClientRoot::boot(SharedStorage::file(&path), api).await;
    assert_eq!(root.session().state().user(), Some(&asha()));
}

#[tokio::test]
async fn corrupt_storage_file_boots_logged_out() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("storage.json");
    std::fs::write(&path, "][").unwrap();

    let root = ClientRoot::boot(SharedStorage::file(&path), Arc::new(FakeBackend::default())).await;
    assert_eq!(root.session().state().status, AuthStatus::Unauthenticated);
}
