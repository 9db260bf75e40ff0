use std::io;
use std::io::ErrorKind;
use std::sync::Arc;

use ntex::http::{header, StatusCode};
use ntex::util::Bytes;
use ntex::web;
use ntex::web::HttpRequest;
use serde::Serialize;
use spdlog::{error, info, warn};

use crate::config::Config;
use crate::content::markdown_renderer::MarkdownRenderer;
use crate::content::metadata::PostMetadata;
use crate::content::PostName;
use crate::error::{StoreError, StoreResult};
use crate::post_store::PostStore;
use crate::query_string::QueryString;
use crate::upload::read_file_field;

pub struct AppState {
    pub store: PostStore,
}

type AppData = web::types::State<Arc<AppState>>;

#[derive(Serialize)]
struct MessageResponse {
    message: String,
}

#[derive(Serialize)]
struct CreatedResponse {
    message: &'static str,
    filename: String,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

fn status_code(err: &StoreError) -> StatusCode {
    match err {
        StoreError::NotFound(_) => StatusCode::NOT_FOUND,
        StoreError::AlreadyExists(_) => StatusCode::CONFLICT,
        StoreError::Validation(_) => StatusCode::BAD_REQUEST,
        StoreError::MetadataDecode { .. } | StoreError::Io { .. } | StoreError::Render { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_response(err: &StoreError) -> web::HttpResponse {
    if err.is_internal() {
        error!("Request failed: {}", err);
    } else {
        warn!("Request rejected: {}", err);
    }

    web::HttpResponse::build(status_code(err))
        .json(&ErrorResponse { error: err.to_string() })
}

fn respond<T: Serialize>(res: StoreResult<T>) -> web::HttpResponse {
    match res {
        Ok(body) => web::HttpResponse::Ok().json(&body),
        Err(e) => error_response(&e),
    }
}

fn query(req: &HttpRequest) -> QueryString {
    QueryString::from_optional(req.uri().query())
}

fn content_type(req: &HttpRequest) -> Option<&str> {
    req.headers()
        .get(header::CONTENT_TYPE)
        .and_then(|val| val.to_str().ok())
}

async fn read_upload(req: &HttpRequest, body: Bytes, field_name: &str) -> StoreResult<crate::upload::UploadedFile> {
    // multer only reads the bytes crate's buffer type, not ntex's
    read_file_field(content_type(req), bytes::Bytes::copy_from_slice(&body), field_name).await
}

/// Lists every post, or renders one when `name` is given.
#[web::get("/posts")]
async fn get_posts(req: HttpRequest, state: AppData) -> web::HttpResponse {
    let qs = query(&req);
    match qs.get("name") {
        None => respond(state.store.list_posts()),
        Some("") => error_response(&StoreError::NotFound(String::new())),
        Some(_) => respond(qs.require_post_name("name").and_then(|name| state.store.get_post(&name))),
    }
}

async fn upload_post(req: &HttpRequest, body: Bytes, state: &AppState) -> StoreResult<CreatedResponse> {
    let upload = read_upload(req, body, "file").await?;
    let file_name = upload.file_name
        .ok_or_else(|| StoreError::validation("Uploaded file has no file name"))?;
    let name = PostName::from_upload(&file_name)?;
    state.store.create_post(&name, &upload.data)?;

    Ok(CreatedResponse {
        message: "File saved",
        filename: name.to_string(),
    })
}

#[web::post("/posts")]
async fn create_post(req: HttpRequest, body: Bytes, state: AppData) -> web::HttpResponse {
    respond(upload_post(&req, body, &state).await)
}

fn merge_metadata(req: &HttpRequest, body: &[u8], state: &AppState) -> StoreResult<MessageResponse> {
    let name = query(req).require_post_name("filePath")?;
    let metadata: PostMetadata = serde_json::from_slice(body)
        .map_err(|e| StoreError::validation(format!("Could not decode metadata: {}", e)))?;
    state.store.update_metadata(&name, metadata)?;

    Ok(MessageResponse {
        message: format!("Metadata updated for {} successfully", name.file_name()),
    })
}

#[web::patch("/posts")]
async fn update_metadata(req: HttpRequest, body: Bytes, state: AppData) -> web::HttpResponse {
    respond(merge_metadata(&req, &body, &state))
}

async fn replace_post(req: &HttpRequest, body: Bytes, state: &AppState) -> StoreResult<MessageResponse> {
    let name = query(req).require_post_name("filename")?;
    let upload = read_upload(req, body, "data").await?;
    state.store.replace_content(&name, &upload.data)?;

    Ok(MessageResponse {
        message: format!("File {} updated successfully", name.file_name()),
    })
}

#[web::put("/posts")]
async fn replace_content(req: HttpRequest, body: Bytes, state: AppData) -> web::HttpResponse {
    respond(replace_post(&req, body, &state).await)
}

#[web::delete("/posts")]
async fn delete_post(req: HttpRequest, state: AppData) -> web::HttpResponse {
    let res = query(&req).require_post_name("filename").and_then(|name| {
        state.store.delete_post(&name)?;
        Ok(MessageResponse {
            message: format!("File {} deleted successfully", name.file_name()),
        })
    });
    respond(res)
}

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(get_posts)
        .service(create_post)
        .service(update_metadata)
        .service(replace_content)
        .service(delete_post);
}

pub fn build_store(config: &Config) -> StoreResult<PostStore> {
    let store = PostStore::new(config.paths.posts_dir.clone())
        .with_metadata_mode(config.store.metadata_mode())
        .with_renderer(MarkdownRenderer::new(config.render));
    store.ensure_root_dir()?;
    Ok(store)
}

pub async fn server_run(config: Config) -> io::Result<()> {
    let store = build_store(&config).map_err(|e| io::Error::new(ErrorKind::Other, e))?;
    info!("Serving posts from {}", store.root_dir().display());

    let bind_addr = config.server.address.clone();
    let bind_port = config.server.port;
    let max_payload_size = config.server.max_payload_size;
    let app_state = Arc::new(AppState { store });

    web::HttpServer::new(move || {
        web::App::new()
            .state(app_state.clone())
            .state(web::types::PayloadConfig::new(max_payload_size))
            .configure(configure_routes)
    })
        .bind((bind_addr, bind_port))?
        .run()
        .await
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::Path;

    use ntex::http::Method;
    use ntex::web::test;
    use serde_json::{json, Value};

    use crate::upload::tests::{content_type, multipart_body};

    use super::*;

    fn state(dir: &Path) -> Arc<AppState> {
        Arc::new(AppState { store: PostStore::new(dir) })
    }

    macro_rules! test_app {
        ($dir:expr) => {
            test::init_service(
                web::App::new()
                    .state(state($dir))
                    .configure(configure_routes),
            ).await
        };
    }

    fn upload_request(method: Method, uri: &str, field: &str, file_name: &str, data: &str) -> ntex::http::Request {
        test::TestRequest::with_uri(uri)
            .method(method)
            .header(header::CONTENT_TYPE, content_type().as_str())
            .set_payload(multipart_body(field, file_name, data))
            .to_request()
    }

    fn patch_request(uri: &str, body: &Value) -> ntex::http::Request {
        test::TestRequest::with_uri(uri)
            .method(Method::PATCH)
            .header(header::CONTENT_TYPE, "application/json")
            .set_payload(body.to_string())
            .to_request()
    }

    fn request(method: Method, uri: &str) -> ntex::http::Request {
        test::TestRequest::with_uri(uri).method(method).to_request()
    }

    async fn body_json(resp: web::WebResponse) -> Value {
        let body = test::read_body(resp).await;
        serde_json::from_slice(&body).unwrap()
    }

    #[ntex::test]
    async fn test_hello_scenario() {
        let dir = tempfile::tempdir().unwrap();
        let app = test_app!(dir.path());

        let resp = test::call_service(&app, upload_request(Method::POST, "/posts", "file", "hello.md", "# Hi\n")).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_json(resp).await, json!({"message": "File saved", "filename": "hello"}));

        let resp = test::call_service(&app, request(Method::GET, "/posts?name=hello")).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body = body_json(resp).await;
        assert_eq!(body["metadata"], json!({
            "description": null,
            "title": null,
            "datepublished": null,
            "tags": null,
            "filename": "hello",
        }));
        assert_eq!(body["content"].as_str().unwrap().trim_end(), "<h1>Hi</h1>");

        let metadata = json!({"description": "d", "title": "t", "datepublished": "2024-01-01", "tags": ["x"]});
        let resp = test::call_service(&app, patch_request("/posts?filePath=hello", &metadata)).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_json(resp).await, json!({"message": "Metadata updated for hello.md successfully"}));

        let resp = test::call_service(&app, request(Method::GET, "/posts?name=hello")).await;
        let body = body_json(resp).await;
        assert_eq!(body["metadata"], json!({
            "description": "d",
            "title": "t",
            "datepublished": "2024-01-01",
            "tags": ["x"],
            "filename": "hello",
        }));
        assert_eq!(body["content"].as_str().unwrap().trim_end(), "<h1>Hi</h1>");
    }

    #[ntex::test]
    async fn test_list_scenario() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.md"), "# A\n").unwrap();
        fs::write(dir.path().join("b.md"), "{\"title\":\"B\"}\n# B\n").unwrap();
        let app = test_app!(dir.path());

        let resp = test::call_service(&app, request(Method::GET, "/posts")).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body = body_json(resp).await;
        let mut records = body.as_array().unwrap().clone();
        records.sort_by_key(|record| record["filename"].as_str().unwrap().to_string());
        assert_eq!(records, vec![
            json!({"description": null, "title": null, "datepublished": null, "tags": null, "filename": "a"}),
            json!({"description": null, "title": "B", "datepublished": null, "tags": null, "filename": "b"}),
        ]);
    }

    #[ntex::test]
    async fn test_get_missing_post() {
        let dir = tempfile::tempdir().unwrap();
        let app = test_app!(dir.path());

        let resp = test::call_service(&app, request(Method::GET, "/posts?name=ghost")).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(resp).await, json!({"error": "Post ghost not found"}));

        let resp = test::call_service(&app, request(Method::GET, "/posts?name=")).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let resp = test::call_service(&app, request(Method::GET, "/posts?name=..%2Fsecret")).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[ntex::test]
    async fn test_create_conflict() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("hello.md"), "original\n").unwrap();
        let app = test_app!(dir.path());

        let resp = test::call_service(&app, upload_request(Method::POST, "/posts", "file", "hello.md", "new\n")).await;
        assert_eq!(resp.status(), StatusCode::CONFLICT);
        assert!(body_json(resp).await["error"].is_string());
        assert_eq!(fs::read_to_string(dir.path().join("hello.md")).unwrap(), "original\n");
    }

    #[ntex::test]
    async fn test_create_requires_file_field() {
        let dir = tempfile::tempdir().unwrap();
        let app = test_app!(dir.path());

        let resp = test::call_service(&app, upload_request(Method::POST, "/posts", "data", "hello.md", "# Hi\n")).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let resp = test::call_service(&app, request(Method::POST, "/posts")).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[ntex::test]
    async fn test_patch_errors() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("hello.md"), "# Hi\n").unwrap();
        let app = test_app!(dir.path());
        let full = json!({"description": "d", "title": "t", "datepublished": null, "tags": []});

        let resp = test::call_service(&app, patch_request("/posts", &full)).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(resp).await, json!({"error": "filePath query parameter is required"}));

        let resp = test::call_service(&app, patch_request("/posts?filePath=ghost", &full)).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let resp = test::call_service(&app, patch_request("/posts?filePath=hello", &json!({"title": "t"}))).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let resp = test::call_service(&app, patch_request("/posts?filePath=hello", &json!(["not", "an", "object"]))).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        assert_eq!(fs::read_to_string(dir.path().join("hello.md")).unwrap(), "# Hi\n");
    }

    #[ntex::test]
    async fn test_patch_accepts_any_value_types() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("b.md"), "{\"title\":\"B\",\"tags\":\"single\"}\n# B\n").unwrap();
        let app = test_app!(dir.path());

        let metadata = json!({"description": "d", "title": "t", "datepublished": 20240101, "tags": "x"});
        let resp = test::call_service(&app, patch_request("/posts?filePath=b", &metadata)).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let resp = test::call_service(&app, request(Method::GET, "/posts")).await;
        assert_eq!(body_json(resp).await, json!([{
            "description": "d",
            "title": "t",
            "datepublished": 20240101,
            "tags": "x",
            "filename": "b",
        }]));
        let raw = fs::read_to_string(dir.path().join("b.md")).unwrap();
        assert_eq!(raw.lines().count(), 2, "{}", raw);
        assert!(raw.ends_with("}\n# B\n"), "{}", raw);
    }

    #[ntex::test]
    async fn test_put_replaces_content() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("hello.md"), "{\"title\":\"t\"}\n# Hi\n").unwrap();
        let app = test_app!(dir.path());

        let resp = test::call_service(&app, upload_request(Method::PUT, "/posts?filename=hello", "data", "any.md", "# Bye\n")).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_json(resp).await, json!({"message": "File hello.md updated successfully"}));
        assert_eq!(fs::read_to_string(dir.path().join("hello.md")).unwrap(), "# Bye\n");

        let resp = test::call_service(&app, upload_request(Method::PUT, "/posts?filename=ghost", "data", "any.md", "x")).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let resp = test::call_service(&app, upload_request(Method::PUT, "/posts", "data", "any.md", "x")).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[ntex::test]
    async fn test_delete() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("hello.md"), "# Hi\n").unwrap();
        let app = test_app!(dir.path());

        let resp = test::call_service(&app, request(Method::DELETE, "/posts")).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let resp = test::call_service(&app, request(Method::DELETE, "/posts?filename=hello")).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_json(resp).await, json!({"message": "File hello.md deleted successfully"}));
        assert!(!dir.path().join("hello.md").exists());

        let resp = test::call_service(&app, request(Method::DELETE, "/posts?filename=hello")).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let resp = test::call_service(&app, request(Method::GET, "/posts?name=hello")).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}
