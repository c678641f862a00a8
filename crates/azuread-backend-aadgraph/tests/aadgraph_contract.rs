//! Handler behaviour against a mocked `graph.windows.net`.

use std::sync::Arc;
use std::time::Duration;

use azuread_backend_aadgraph::{
    AadGraphClient, AadGraphDirectory, ApplicationHandler, CredentialParent, GroupHandler,
    GroupMemberHandler, LinkRelationship, PasswordHandler, ServicePrincipalHandler,
};
use azuread_core::resources::SERVICE_PRINCIPAL_PASSWORD;
use azuread_core::traits::UserDirectory;
use azuread_core::{
    LockRegistry, Operation, OperationRequest, Provider, RelationshipApi, ResourceData,
    ResourceHandler, ResourceRouter, StaticTokenAuthorizer, Timeouts,
};
use serde_json::{Value, json};
use wiremock::matchers::{body_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TENANT: &str = "contoso";
const SP_ID: &str = "00000000-0000-0000-0000-0000000000d1";
const APP_ID: &str = "00000000-0000-0000-0000-0000000000c1";
const GROUP_ID: &str = "00000000-0000-0000-0000-0000000000a1";
const USER_A: &str = "00000000-0000-0000-0000-0000000000b1";
const USER_B: &str = "00000000-0000-0000-0000-0000000000b2";
const OLD_KEY: &str = "00000000-0000-0000-0000-0000000000e1";
const NEW_KEY: &str = "00000000-0000-0000-0000-0000000000e2";

async fn setup() -> (MockServer, Arc<AadGraphClient>) {
    let server = MockServer::start().await;
    let client = AadGraphClient::new(
        &server.uri(),
        TENANT,
        Arc::new(StaticTokenAuthorizer::new("test-token")),
    )
    .unwrap();
    (server, Arc::new(client))
}

fn tenant_path(rest: &str) -> String {
    format!("/{TENANT}/{rest}")
}

fn data(type_name: &str, id: &str, planned: Value, prior: Value) -> ResourceData {
    ResourceData::new(
        type_name,
        id,
        planned.as_object().cloned().unwrap_or_default(),
        prior.as_object().cloned().unwrap_or_default(),
    )
    .with_set_attributes(["members", "owners", "app_role", "oauth2_permissions"])
    .with_timeouts(Timeouts::uniform(Duration::from_secs(5)))
}

fn not_found() -> ResponseTemplate {
    ResponseTemplate::new(404).set_body_json(json!({
        "odata.error": {"code": "Request_ResourceNotFound", "message": {"lang": "en", "value": "gone"}}
    }))
}

fn objects(ids: &[&str]) -> ResponseTemplate {
    let value: Vec<Value> = ids.iter().map(|id| json!({ "objectId": id })).collect();
    ResponseTemplate::new(200).set_body_json(json!({ "value": value }))
}

fn credential(key_id: &str) -> Value {
    json!({
        "keyId": key_id,
        "startDate": "2020-01-01T00:00:00Z",
        "endDate": "2030-01-01T00:00:00Z",
    })
}

fn sp_password_handler(client: Arc<AadGraphClient>) -> PasswordHandler {
    PasswordHandler::new(
        client,
        Arc::new(LockRegistry::new()),
        CredentialParent::SERVICE_PRINCIPAL,
    )
}

#[tokio::test]
async fn password_create_appends_to_the_existing_list() {
    let (server, client) = setup().await;
    let creds_path = tenant_path(&format!("servicePrincipals/{SP_ID}/passwordCredentials"));

    // First listing sees only the existing key, later ones the new key too
    Mock::given(method("GET"))
        .and(path(creds_path.as_str()))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "value": [credential(OLD_KEY)] })),
        )
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(creds_path.as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": [
                credential(OLD_KEY),
                {
                    "keyId": NEW_KEY,
                    "startDate": "2021-06-01T00:00:00Z",
                    "endDate": "2031-06-01T00:00:00Z",
                    "customKeyIdentifier": "Y2kgdG9rZW4=",
                },
            ]
        })))
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path(creds_path.as_str()))
        .and(query_param("api-version", "1.6"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(tenant_path(&format!("servicePrincipals/{SP_ID}"))))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "objectId": SP_ID })))
        .mount(&server)
        .await;

    let handler = sp_password_handler(client);
    let mut d = data(
        "azuread_service_principal_password",
        "",
        json!({
            "service_principal_id": SP_ID,
            "key_id": NEW_KEY,
            "value": "s3cret",
            "description": "ci token",
            "start_date": "2021-06-01T00:00:00Z",
            "end_date": "2031-06-01T00:00:00Z",
        }),
        json!({}),
    );
    handler.create(&mut d).await.unwrap();

    assert_eq!(d.id(), format!("{SP_ID}/password/{NEW_KEY}"));
    let state = d.state();
    assert_eq!(state["description"], "ci token");
    assert_eq!(state["end_date"], "2031-06-01T00:00:00Z");
    assert_eq!(state["value"], "s3cret");

    let requests = server.received_requests().await.unwrap_or_default();
    let patch = requests
        .iter()
        .find(|r| r.method.as_str() == "PATCH")
        .unwrap();
    let body: Value = serde_json::from_slice(&patch.body).unwrap();
    let sent = body["value"].as_array().unwrap();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0]["keyId"], OLD_KEY);
    assert_eq!(sent[1]["keyId"], NEW_KEY);
    assert_eq!(sent[1]["value"], "s3cret");
    assert_eq!(sent[1]["customKeyIdentifier"], "Y2kgdG9rZW4=");
}

#[tokio::test]
async fn password_with_an_existing_key_id_must_be_imported() {
    let (server, client) = setup().await;
    let creds_path = tenant_path(&format!("servicePrincipals/{SP_ID}/passwordCredentials"));
    Mock::given(method("GET"))
        .and(path(creds_path.as_str()))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "value": [credential(OLD_KEY)] })),
        )
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path(creds_path.as_str()))
        .respond_with(ResponseTemplate::new(204))
        .expect(0)
        .mount(&server)
        .await;

    let handler = sp_password_handler(client);
    let mut d = data(
        "azuread_service_principal_password",
        "",
        json!({
            "service_principal_id": SP_ID,
            "key_id": OLD_KEY,
            "value": "s3cret",
            "end_date_relative": "240h",
        }),
        json!({}),
    );
    let err = handler.create(&mut d).await.unwrap_err();
    assert!(err.to_string().contains("already exists"), "{err}");
    assert!(d.is_absent());
}

#[tokio::test]
async fn password_read_clears_id_when_parent_is_gone() {
    let (server, client) = setup().await;
    Mock::given(method("GET"))
        .and(path(tenant_path(&format!("servicePrincipals/{SP_ID}"))))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "odata.error": {"code": "Request_ResourceNotFound", "message": {"lang": "en", "value": "gone"}}
        })))
        .mount(&server)
        .await;

    let handler = sp_password_handler(client);
    let id = format!("{SP_ID}/password/{OLD_KEY}");
    let mut d = data("azuread_service_principal_password", &id, json!({}), json!({}));
    handler.read(&mut d).await.unwrap();
    assert!(d.is_absent());
}

#[tokio::test]
async fn password_delete_rewrites_the_list_without_the_key() {
    let (server, client) = setup().await;
    let creds_path = tenant_path(&format!("applications/{APP_ID}/passwordCredentials"));
    Mock::given(method("GET"))
        .and(path(tenant_path(&format!("applications/{APP_ID}"))))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "objectId": APP_ID })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(creds_path.as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": [credential(OLD_KEY), credential(NEW_KEY)]
        })))
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path(creds_path.as_str()))
        .and(body_json(json!({ "value": [credential(NEW_KEY)] })))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let handler = PasswordHandler::new(
        client,
        Arc::new(LockRegistry::new()),
        CredentialParent::APPLICATION,
    );
    let id = format!("{APP_ID}/password/{OLD_KEY}");
    let mut d = data("azuread_application_password", &id, json!({}), json!({}));
    handler.delete(&mut d).await.unwrap();
}

#[tokio::test]
async fn removed_group_members_are_unlinked_and_waited_out() {
    let (server, client) = setup().await;
    let members_path = tenant_path(&format!("groups/{GROUP_ID}/members"));

    Mock::given(method("GET"))
        .and(path(members_path.as_str()))
        .respond_with(objects(&[USER_A, USER_B]))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(members_path.as_str()))
        .respond_with(objects(&[USER_A]))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path(tenant_path(&format!("groups/{GROUP_ID}/$links/members/{USER_B}"))))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(tenant_path(&format!("groups/{GROUP_ID}/$links/members"))))
        .respond_with(ResponseTemplate::new(204))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(tenant_path(&format!("groups/{GROUP_ID}"))))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "objectId": GROUP_ID,
            "displayName": "ops",
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(tenant_path(&format!("groups/{GROUP_ID}/owners"))))
        .respond_with(objects(&[]))
        .mount(&server)
        .await;

    let handler = GroupHandler::new(client);
    let mut d = data(
        "azuread_group",
        GROUP_ID,
        json!({"display_name": "ops", "members": [USER_A]}),
        json!({"display_name": "ops", "members": [USER_A, USER_B]}),
    );
    handler.update(&mut d).await.unwrap();
    assert_eq!(d.state()["members"], json!([USER_A]));
}

#[tokio::test]
async fn native_application_is_converted_after_create() {
    let (server, client) = setup().await;
    let app_path = tenant_path(&format!("applications/{APP_ID}"));

    Mock::given(method("POST"))
        .and(path(tenant_path("applications")))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "objectId": APP_ID,
            "appId": "11111111-1111-1111-1111-111111111111",
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(app_path.as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "objectId": APP_ID,
            "appId": "11111111-1111-1111-1111-111111111111",
            "displayName": "cli",
            "publicClient": true,
            "identifierUris": [],
        })))
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path(app_path.as_str()))
        .and(body_json(json!({"homepage": null, "identifierUris": [], "publicClient": true})))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(tenant_path(&format!("applications/{APP_ID}/owners"))))
        .respond_with(objects(&[]))
        .mount(&server)
        .await;

    let handler = ApplicationHandler::new(client);
    let mut d = data(
        "azuread_application",
        "",
        json!({"display_name": "cli", "type": "native"}),
        json!({}),
    );
    handler.create(&mut d).await.unwrap();
    assert_eq!(d.state()["type"], "native");
    assert_eq!(d.state()["public_client"], true);
}

#[tokio::test]
async fn group_member_create_posts_a_link() {
    let (server, client) = setup().await;
    let members_path = tenant_path(&format!("groups/{GROUP_ID}/members"));

    Mock::given(method("GET"))
        .and(path(members_path.as_str()))
        .respond_with(objects(&[]))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(members_path.as_str()))
        .respond_with(objects(&[USER_A]))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(tenant_path(&format!("groups/{GROUP_ID}/$links/members"))))
        .and(body_json(json!({
            "url": format!("{}/{TENANT}/directoryObjects/{USER_A}", server.uri())
        })))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let handler = GroupMemberHandler::new(client, Arc::new(LockRegistry::new()));
    let mut d = data(
        "azuread_group_member",
        "",
        json!({"group_object_id": GROUP_ID, "member_object_id": USER_A}),
        json!({}),
    );
    handler.create(&mut d).await.unwrap();
    assert_eq!(d.id(), format!("{GROUP_ID}/member/{USER_A}"));
}

#[tokio::test]
async fn relative_next_links_are_followed() {
    let (server, client) = setup().await;
    let members_path = tenant_path(&format!("groups/{GROUP_ID}/members"));
    Mock::given(method("GET"))
        .and(path(members_path.as_str()))
        .and(query_param("$skiptoken", "page2"))
        .and(query_param("api-version", "1.6"))
        .respond_with(objects(&[USER_B]))
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(members_path.as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": [{"objectId": USER_A}],
            "odata.nextLink": format!("groups/{GROUP_ID}/members?$skiptoken=page2"),
        })))
        .mount(&server)
        .await;

    let members = LinkRelationship::members(client);
    assert_eq!(members.list(GROUP_ID).await.unwrap(), vec![USER_A, USER_B]);
}

#[tokio::test]
async fn users_are_addressed_by_principal_name() {
    let (server, client) = setup().await;
    Mock::given(method("GET"))
        .and(path(tenant_path("users/alice%40example.com")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "objectId": USER_A,
            "userPrincipalName": "alice@example.com",
            "accountEnabled": true,
            "onPremisesSamAccountName": "alice",
        })))
        .mount(&server)
        .await;

    let directory = AadGraphDirectory::new(client);
    let user = directory
        .user_by_principal_name("alice@example.com")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(user.object_id, USER_A);
    assert_eq!(user.onpremises_sam_account_name.as_deref(), Some("alice"));
    assert!(
        directory
            .user_by_principal_name("bob@example.com")
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn password_value_change_is_rejected_without_writing() {
    let (server, client) = setup().await;
    let creds_path = tenant_path(&format!("servicePrincipals/{SP_ID}/passwordCredentials"));
    Mock::given(method("PATCH"))
        .and(path(creds_path.as_str()))
        .respond_with(ResponseTemplate::new(204))
        .expect(0)
        .mount(&server)
        .await;

    let mut router = ResourceRouter::new(false);
    azuread_backend_aadgraph::register(&mut router, client, Arc::new(LockRegistry::new())).unwrap();
    let provider = Provider::new(router, Timeouts::uniform(Duration::from_secs(5)));

    let id = format!("{SP_ID}/password/{OLD_KEY}");
    let response = provider
        .execute(
            OperationRequest::resource(SERVICE_PRINCIPAL_PASSWORD, Operation::Update)
                .with_config(
                    json!({
                        "service_principal_id": SP_ID,
                        "value": "NEW-secret",
                        "end_date": "2030-01-01T00:00:00Z",
                    })
                    .as_object()
                    .cloned()
                    .unwrap(),
                )
                .with_prior_state(
                    json!({
                        "id": id,
                        "service_principal_id": SP_ID,
                        "key_id": OLD_KEY,
                        "value": "old-secret",
                        "end_date": "2030-01-01T00:00:00Z",
                    })
                    .as_object()
                    .cloned()
                    .unwrap(),
                ),
        )
        .await;

    assert!(response.error_summary().unwrap().contains("requires replacement"));
    assert_eq!(response.state.unwrap()["value"], json!("old-secret"));
}

#[tokio::test]
async fn service_principal_create_waits_and_reads_back() {
    let (server, client) = setup().await;
    Mock::given(method("POST"))
        .and(path(tenant_path("servicePrincipals")))
        .and(body_json(json!({"appId": APP_ID, "accountEnabled": true})))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "objectId": SP_ID,
            "appId": APP_ID,
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(tenant_path(&format!("servicePrincipals/{SP_ID}"))))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "objectId": SP_ID,
            "appId": APP_ID,
            "displayName": "billing",
            "oauth2Permissions": [{
                "adminConsentDescription": "Access billing",
                "adminConsentDisplayName": "Access billing",
                "id": NEW_KEY,
                "isEnabled": true,
                "type": "User",
                "value": "user_impersonation",
            }],
        })))
        .mount(&server)
        .await;

    let handler = ServicePrincipalHandler::new(client);
    let mut d = data(
        "azuread_service_principal",
        "",
        json!({"application_id": APP_ID}),
        json!({}),
    );
    handler.create(&mut d).await.unwrap();

    assert_eq!(d.id(), SP_ID);
    assert_eq!(d.get_str("application_id"), APP_ID);
    assert_eq!(d.get_str("display_name"), "billing");
    assert!(!d.get_bool("app_role_assignment_required"));
    assert_eq!(d.get_list("oauth2_permissions")[0]["value"], "user_impersonation");
}

#[tokio::test]
async fn service_principal_read_clears_id_when_gone() {
    let (server, client) = setup().await;
    Mock::given(method("GET"))
        .and(path(tenant_path(&format!("servicePrincipals/{SP_ID}"))))
        .respond_with(not_found())
        .mount(&server)
        .await;

    let handler = ServicePrincipalHandler::new(client);
    let mut d = data("azuread_service_principal", SP_ID, json!({}), json!({}));
    handler.read(&mut d).await.unwrap();
    assert!(d.is_absent());
}

#[tokio::test]
async fn service_principal_delete_tolerates_absence() {
    let (server, client) = setup().await;
    Mock::given(method("DELETE"))
        .and(path(tenant_path(&format!("servicePrincipals/{SP_ID}"))))
        .respond_with(not_found())
        .expect(1)
        .mount(&server)
        .await;

    let handler = ServicePrincipalHandler::new(client);
    let mut d = data("azuread_service_principal", SP_ID, json!({}), json!({}));
    handler.delete(&mut d).await.unwrap();
}

#[tokio::test]
async fn group_delete_tolerates_absence() {
    let (server, client) = setup().await;
    Mock::given(method("DELETE"))
        .and(path(tenant_path(&format!("groups/{GROUP_ID}"))))
        .respond_with(not_found())
        .expect(1)
        .mount(&server)
        .await;

    let handler = GroupHandler::new(client);
    let mut d = data("azuread_group", GROUP_ID, json!({}), json!({}));
    handler.delete(&mut d).await.unwrap();
}

#[tokio::test]
async fn multi_tenant_application_is_restricted_before_delete() {
    let (server, client) = setup().await;
    let app_path = tenant_path(&format!("applications/{APP_ID}"));
    Mock::given(method("PATCH"))
        .and(path(app_path.as_str()))
        .and(body_json(json!({"availableToOtherTenants": false})))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path(app_path.as_str()))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let handler = ApplicationHandler::new(client);
    let mut d = data(
        "azuread_application",
        APP_ID,
        json!({"available_to_other_tenants": true}),
        json!({"available_to_other_tenants": true}),
    );
    handler.delete(&mut d).await.unwrap();

    let methods: Vec<String> = server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .map(|r| r.method.to_string())
        .collect();
    assert_eq!(methods, vec!["PATCH", "DELETE"]);
}
