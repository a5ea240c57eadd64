//! Embedded static resources.
//!
//! - `template` - Template types for typed variable injection
//! - `build` - page templates used by the build pipeline
//! - `serve` - the live reload client script

mod template;

pub use template::{Template, TemplateVars};

pub mod build {
    use super::{Template, TemplateVars};

    /// Variables for page templates (built-in or `theme.custom_dir/main.html`).
    pub struct PageVars<'a> {
        pub title: &'a str,
        pub site_name: &'a str,
        pub content: &'a str,
        pub canonical: &'a str,
        /// Mount path of the site, used for the home link.
        pub base: &'a str,
        pub livereload: &'a str,
    }

    impl TemplateVars for PageVars<'_> {
        fn apply(&self, content: &str) -> String {
            // Content goes last so placeholders inside page text survive.
            content
                .replace("{{ title }}", self.title)
                .replace("{{ site_name }}", self.site_name)
                .replace("{{ canonical }}", self.canonical)
                .replace("{{ base }}", self.base)
                .replace("{{ livereload }}", self.livereload)
                .replace("{{ content }}", self.content)
        }
    }

    /// Built-in page template.
    pub const PAGE_HTML: Template<PageVars<'static>> = Template::new(include_str!("build/page.html"));

    /// Built-in not-found page, written when the docs have no `404.md`.
    pub const NOT_FOUND_HTML: Template<PageVars<'static>> =
        Template::new(include_str!("build/404.html"));
}

pub mod serve {
    use super::{Template, TemplateVars};

    /// Variables for livereload.js.
    pub struct LivereloadVars {
        pub ws_port: u16,
    }

    impl TemplateVars for LivereloadVars {
        fn apply(&self, content: &str) -> String {
            content.replace("__FOLIO_WS_PORT__", &self.ws_port.to_string())
        }
    }

    /// File name the script is served under, relative to the mount path.
    pub const LIVERELOAD_JS_NAME: &str = "livereload.js";

    /// Live reload client with WebSocket port injection.
    pub const LIVERELOAD_JS: Template<LivereloadVars> =
        Template::new(include_str!("serve/livereload.js"));
}
