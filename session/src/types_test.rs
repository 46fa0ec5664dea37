use super::*;

fn wire(json: &str) -> WireUser {
    serde_json::from_str(json).unwrap()
}

// =============================================================================
// User / WireUser
// =============================================================================

#[test]
fn user_is_complete_requires_all_three_fields() {
    let mut user = User { id: "1".into(), name: "Asha".into(), email: "a@x.com".into(), phone: None };
    assert!(user.is_complete());
    user.email.clear();
    assert!(!user.is_complete());
}

#[test]
fn user_serializes_without_absent_phone() {
    let user = User { id: "1".into(), name: "Asha".into(), email: "a@x.com".into(), phone: None };
    let json = serde_json::to_value(&user).unwrap();
    assert_eq!(json, serde_json::json!({"id": "1", "name": "Asha", "email": "a@x.com"}));
}

#[test]
fn wire_user_maps_underscore_id() {
    let user = wire(r#"{"_id":"64f0","name":"Ravi","email":"r@x.com","phone":"98470"}"#)
        .into_user()
        .unwrap();
    assert_eq!(user.id, "64f0");
    assert_eq!(user.phone.as_deref(), Some("98470"));
}

#[test]
fn wire_user_prefers_underscore_id_over_id() {
    let user = wire(r#"{"_id":"mongo","id":"plain","name":"Ravi","email":"r@x.com"}"#)
        .into_user()
        .unwrap();
    assert_eq!(user.id, "mongo");
}

#[test]
fn wire_user_accepts_numeric_id() {
    let user = wire(r#"{"id":7,"name":"Ravi","email":"r@x.com"}"#).into_user().unwrap();
    assert_eq!(user.id, "7");
}

#[test]
fn wire_user_missing_email_is_rejected() {
    assert!(wire(r#"{"id":"1","name":"Ravi"}"#).into_user().is_none());
}

#[test]
fn wire_user_empty_name_is_rejected() {
    assert!(wire(r#"{"id":"1","name":"","email":"r@x.com"}"#).into_user().is_none());
}

#[test]
fn parse_cached_user_rejects_corrupt_json() {
    assert!(parse_cached_user("{not json").is_none());
    assert!(parse_cached_user("null").is_none());
}

#[test]
fn parse_cached_user_accepts_stored_shape() {
    let user = parse_cached_user(r#"{"id":"1","name":"Asha","email":"a@x.com"}"#).unwrap();
    assert_eq!(user.name, "Asha");
}

// =============================================================================
// Requests
// =============================================================================

#[test]
fn login_data_with_phone_omits_email() {
    let json = serde_json::to_value(LoginData::with_phone("98470", "pw")).unwrap();
    assert_eq!(json, serde_json::json!({"phone": "98470", "password": "pw"}));
}

#[test]
fn register_data_login_uses_email_and_password() {
    let data = RegisterData {
        name: "Asha".into(),
        email: "a@x.com".into(),
        phone: Some("98470".into()),
        password: "secret".into(),
    };
    assert_eq!(data.login_data(), LoginData::with_email("a@x.com", "secret"));
}

#[test]
fn profile_update_serializes_camel_case_and_skips_unset() {
    let update = ProfileUpdate { land_size: Some("2 acres".into()), ..ProfileUpdate::default() };
    let json = serde_json::to_value(&update).unwrap();
    assert_eq!(json, serde_json::json!({"landSize": "2 acres"}));
    assert!(!update.is_empty());
    assert!(ProfileUpdate::default().is_empty());
}

#[test]
fn activity_reads_type_and_underscore_id() {
    let activity: Activity = serde_json::from_str(
        r#"{"_id":"a1","type":"Irrigation","date":"2024-06-01","location":"Paddy field","description":"Drip","quantity":"200 L"}"#,
    )
    .unwrap();
    assert_eq!(activity.id.as_deref(), Some("a1"));
    assert_eq!(activity.kind, "Irrigation");
    assert!(activity.notes.is_empty());
}

#[test]
fn farmer_profile_tolerates_missing_fields() {
    let profile: FarmerProfile = serde_json::from_str(r#"{"_id":"1","name":"Asha","soilType":"laterite"}"#).unwrap();
    assert_eq!(profile.soil_type.as_deref(), Some("laterite"));
    assert!(profile.crop.is_none());
}
