/// Joins the service base URL and a short code into a fully qualified short URL.
pub fn format_short_url(base_url: &str, code: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), code)
}
