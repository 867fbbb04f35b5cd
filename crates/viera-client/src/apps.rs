//! Installed app list.

/// An app installed on the TV.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct App {
    /// Id accepted by `launch_app`.
    pub product_id: String,
    pub name: String,
    pub icon_url: Option<String>,
}

/// Parse the `X_AppList` text.
///
/// Entries look like `vc_app&product_id=0387878700000062&Netflix&1&http://.../icon.png&&`
/// and are concatenated; unparseable entries are skipped.
pub(crate) fn parse_app_list(list: &str) -> Vec<App> {
    list.split("vc_app")
        .filter_map(|entry| {
            let mut fields = entry.split('&').filter(|f| !f.is_empty());
            let product_id = fields.next()?.strip_prefix("product_id=")?.trim();
            let name = fields.next()?.trim();
            if product_id.is_empty() {
                return None;
            }

            let icon_url = fields
                .find(|f| f.starts_with("http://") || f.starts_with("https://"))
                .map(|f| f.trim().to_string());

            Some(App {
                product_id: product_id.to_string(),
                name: name.to_string(),
                icon_url,
            })
        })
        .collect()
}

/// `X_LaunchApp` keyword: 16-character ids are product ids, anything else a resource id.
pub(crate) fn launch_keyword(app_id: &str) -> String {
    if app_id.len() == 16 {
        format!("product_id={}", app_id)
    } else {
        format!("resource_id={}", app_id)
    }
}
