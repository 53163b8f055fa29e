use mockito::Matcher;
use serde_json::json;

use openai_text_api::{ChatMessage, ChatParams, CompletionParams, Credentials, OpenAiClient, RequestParameters, TextGenerationClient};

fn client(server: &mockito::Server, organization: Option<&str>) -> OpenAiClient {
    OpenAiClient::new(Credentials::new("sk-test", organization.map(str::to_string))).with_base_url(server.url())
}

#[tokio::test]
async fn chat_posts_payload_with_credentials() {
    let mut server = mockito::Server::new_async().await;
    let body = json!({"id": "chatcmpl-1", "choices": [{"message": {"role": "assistant", "content": "hello"}}]});
    let mock = server
        .mock("POST", "/chat/completions")
        .match_header("authorization", "Bearer sk-test")
        .match_header("openai-organization", "org-42")
        .match_body(Matcher::Json(json!({
            "model": "gpt-3.5-turbo",
            "temperature": 0.0,
            "messages": [{"role": "user", "content": "hi"}],
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(body.to_string())
        .expect(1)
        .create_async()
        .await;

    let params: RequestParameters = ChatParams::new("gpt-3.5-turbo", vec![ChatMessage::user("hi")], 0.0)
        .unwrap()
        .into();
    let response = client(&server, Some("org-42")).generate(&params).await.unwrap();

    assert_eq!(response, body);
    mock.assert_async().await;
}

#[tokio::test]
async fn completion_uses_completions_endpoint() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/completions")
        .match_header("openai-organization", Matcher::Missing)
        .match_body(Matcher::PartialJson(json!({"prompt": "Once upon a time", "max_tokens": 8})))
        .with_status(200)
        .with_body(r#"{"choices": [{"text": " there was"}]}"#)
        .create_async()
        .await;

    let params: RequestParameters = CompletionParams::new("davinci-002", "Once upon a time", 0.0)
        .unwrap()
        .with_extra("max_tokens", 8)
        .into();
    let response = client(&server, None).generate(&params).await.unwrap();

    assert_eq!(response["choices"][0]["text"], " there was");
    mock.assert_async().await;
}

#[tokio::test]
async fn error_status_carries_vendor_message() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/chat/completions")
        .with_status(400)
        .with_body(r#"{"error": {"message": "This model's maximum context length is 4097 tokens.", "type": "invalid_request_error"}}"#)
        .create_async()
        .await;

    let params: RequestParameters = ChatParams::from_prompt("gpt-3.5-turbo", "very long", 0.0).unwrap().into();
    let err = client(&server, None).generate(&params).await.unwrap_err();

    assert_eq!(err.status, Some(400));
    assert_eq!(err.message, "This model's maximum context length is 4097 tokens.");
}

#[tokio::test]
async fn unparseable_success_body_is_an_error() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/completions")
        .with_status(200)
        .with_body("<html>gateway</html>")
        .create_async()
        .await;

    let params: RequestParameters = CompletionParams::new("davinci-002", "p", 0.0).unwrap().into();
    let err = client(&server, None).generate(&params).await.unwrap_err();
    assert_eq!(err.status, Some(200));
}
