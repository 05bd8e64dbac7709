//! Assistant management flows driven against the mock API

mod common;

use common::{send, AssistantsPage};
use leapfrog_mock::{fixtures, types::NewAssistant, InterceptedRequest, MockApi};
use pretty_assertions::assert_eq;
use reqwest::StatusCode;
use serde_json::json;

#[tokio::test]
async fn test_create_assistant() {
    let api = MockApi::new();
    let mut page = AssistantsPage::open(&api);

    let created = page
        .create(&fixtures::fake_assistant_input("Frog Expert"))
        .await
        .unwrap();

    assert_eq!(page.toasts, vec!["Assistant Created."]);
    assert!(created.id.starts_with("asst_"));
    assert_eq!(created.model, "vllm");
    assert_eq!(api.assistants(), vec![created]);
}

#[tokio::test]
async fn test_create_assistant_requires_fields() {
    let api = MockApi::new();
    let mut page = AssistantsPage::open(&api);

    let input = NewAssistant {
        name: "No tagline".to_string(),
        instructions: Some("Be brief.".to_string()),
        ..Default::default()
    };
    assert!(page.create(&input).await.is_none());
    assert_eq!(page.toasts.len(), 1);
    assert!(page.toasts[0].contains("Please enter a tagline."));
    assert!(api.assistants().is_empty());
}

#[tokio::test]
async fn test_create_assistant_error() {
    let api = MockApi::new();
    api.scenario().create_assistant_error();
    let mut page = AssistantsPage::open(&api);

    assert!(page
        .create(&fixtures::fake_assistant_input("Frog Expert"))
        .await
        .is_none());
    assert_eq!(page.toasts, vec!["Error Creating Assistant"]);
    assert!(api.assistants().is_empty());

    assert!(page
        .create(&fixtures::fake_assistant_input("Frog Expert"))
        .await
        .is_some());
}

#[tokio::test]
async fn test_edit_assistant_and_error() {
    let api = MockApi::new();
    let assistant = fixtures::fake_assistant("Frog Helper");
    api.set_assistants(vec![assistant.clone()]);
    let mut page = AssistantsPage::open(&api);

    api.scenario().update_assistant_error();
    assert!(page
        .edit(&assistant.id, json!({"name": "Toad Helper"}))
        .await
        .is_none());
    assert_eq!(page.toasts, vec!["Error Updating Assistant"]);
    assert_eq!(api.assistants()[0].name, "Frog Helper");

    let updated = page
        .edit(&assistant.id, json!({"name": "Toad Helper"}))
        .await
        .unwrap();
    assert_eq!(updated.name, "Toad Helper");
    assert_eq!(updated.instructions, assistant.instructions);
    assert_eq!(page.toasts.last().unwrap(), "Assistant Updated.");

    assert!(page
        .edit(&assistant.id, json!({"instructions": ""}))
        .await
        .is_none());
}

#[tokio::test]
async fn test_search_and_delete() {
    let api = MockApi::new();
    api.set_assistants(vec![
        fixtures::fake_assistant("Frog Helper"),
        fixtures::fake_assistant("Math Tutor"),
        fixtures::fake_assistant("frog facts"),
    ]);
    let mut page = AssistantsPage::open(&api);

    assert_eq!(page.search("frog").await, vec!["Frog Helper", "frog facts"]);
    assert_eq!(page.search("tutor").await, vec!["Math Tutor"]);
    assert!(page.search("zebra").await.is_empty());

    let id = api.assistants()[1].id.clone();
    page.delete(&id).await;
    assert_eq!(page.toasts, vec!["Assistant Deleted."]);
    assert_eq!(api.assistants().len(), 2);

    let response = send(&api, InterceptedRequest::get(&format!("/assistants/{id}"))).await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_search_matches_description_and_instructions() {
    let mut lily = fixtures::fake_assistant("Lily");
    lily.description = Some("Lives in the pond".to_string());
    lily.instructions = Some("Speak like a toad.".to_string());
    let api = MockApi::new();
    api.set_assistants(vec![lily, fixtures::fake_assistant("Math Tutor")]);
    let page = AssistantsPage::open(&api);

    assert_eq!(page.search("POND").await, vec!["Lily"]);
    assert_eq!(page.search("toad").await, vec!["Lily"]);
    assert_eq!(page.search("helpful").await, vec!["Math Tutor"]);
}

#[tokio::test]
async fn test_search_query_is_encoded() {
    let api = MockApi::new();
    api.set_assistants(vec![
        fixtures::fake_assistant("Frogs & Toads"),
        fixtures::fake_assistant("Frogs"),
    ]);
    let page = AssistantsPage::open(&api);

    assert_eq!(page.search("frogs & toads").await, vec!["Frogs & Toads"]);
    assert_eq!(page.search("100% frog").await, Vec::<String>::new());

    let searches = api.requests_matching(&reqwest::Method::GET, "/assistants");
    assert_eq!(
        searches[0].query,
        vec![("search".to_string(), "frogs & toads".to_string())]
    );
}

#[tokio::test]
async fn test_canned_assistant_list() {
    let api = MockApi::new();
    api.scenario()
        .get_assistants(vec![fixtures::fake_assistant("Canned")]);

    let response = send(&api, InterceptedRequest::get("/assistants")).await;
    let body = response.body_json().unwrap();
    assert_eq!(body["data"][0]["name"], "Canned");
    assert!(api.assistants().is_empty());
}
