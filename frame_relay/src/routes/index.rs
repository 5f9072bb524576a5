use axum::response::Html;

const CAPTURE_PAGE: &str = include_str!("../../static/index.html");

pub async fn capture_page() -> Html<&'static str> {
    Html(CAPTURE_PAGE)
}
