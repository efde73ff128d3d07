//! Endpoint inference from file-system routing conventions.
//!
//! Supported layouts:
//! - app router: `app/**/route.{ts,js,tsx,jsx,mjs}`
//! - pages router: `pages/api/**.{ts,js,tsx,jsx,mjs}`
//!
//! Directory segments become path segments, `[id]` becomes `:id`,
//! `[...slug]` / `[[...slug]]` become `:slug*`. Route groups `(group)` and
//! parallel slots `@slot` add nothing to the URL; `_private` folders are
//! not routable.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::str::FromStr;
use std::sync::LazyLock;

const ROUTE_EXTENSIONS: [&str; 5] = ["ts", "js", "tsx", "jsx", "mjs"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Head => "HEAD",
            HttpMethod::Options => "OPTIONS",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HttpMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(HttpMethod::Get),
            "POST" => Ok(HttpMethod::Post),
            "PUT" => Ok(HttpMethod::Put),
            "PATCH" => Ok(HttpMethod::Patch),
            "DELETE" => Ok(HttpMethod::Delete),
            "HEAD" => Ok(HttpMethod::Head),
            "OPTIONS" => Ok(HttpMethod::Options),
            _ => Err(format!("unsupported HTTP method '{}'", s)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DiscoveredEndpoint {
    pub method: HttpMethod,
    pub path: String,
    /// Route file, relative to the project root
    pub file: PathBuf,
}

impl DiscoveredEndpoint {
    pub fn has_params(&self) -> bool {
        self.path.split('/').any(|segment| segment.starts_with(':'))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouterKind {
    AppRouter,
    PagesApi,
}

/// A file recognised as a route definition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteFile {
    pub kind: RouterKind,
    pub path: String,
}

static APP_EXPORT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"export\s+(?:async\s+)?(?:function\s*\*?\s*|const\s+|let\s+)(GET|POST|PUT|PATCH|DELETE|HEAD|OPTIONS)\b",
    )
    .unwrap()
});

static EXPORT_LIST: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"export\s*\{([^}]*)\}").unwrap());

static EXPORT_ALIAS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|[\s,])(?:\w+\s+as\s+)?(GET|POST|PUT|PATCH|DELETE|HEAD|OPTIONS)\b").unwrap()
});

static PAGES_METHOD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?:method\s*===?\s*|case\s+)['"](GET|POST|PUT|PATCH|DELETE|HEAD|OPTIONS)['"]"#,
    )
    .unwrap()
});

enum Segment {
    Static(String),
    Param(String),
    CatchAll(String),
    Invisible,
    Private,
}

fn classify_segment(raw: &str) -> Segment {
    if raw.starts_with('_') {
        return Segment::Private;
    }
    if (raw.starts_with('(') && raw.ends_with(')')) || raw.starts_with('@') {
        return Segment::Invisible;
    }
    let inner = raw
        .strip_prefix("[[")
        .and_then(|s| s.strip_suffix("]]"))
        .or_else(|| raw.strip_prefix('[').and_then(|s| s.strip_suffix(']')));
    match inner {
        Some(inner) => match inner.strip_prefix("...") {
            Some(name) => Segment::CatchAll(name.to_string()),
            None => Segment::Param(inner.to_string()),
        },
        None => Segment::Static(raw.to_string()),
    }
}

/// Convert directory segments into a URL path; `None` for private routes
pub fn segments_to_path<'a>(segments: impl IntoIterator<Item = &'a str>) -> Option<String> {
    let mut parts = Vec::new();
    for raw in segments {
        match classify_segment(raw) {
            Segment::Static(s) => parts.push(s),
            Segment::Param(name) => parts.push(format!(":{}", name)),
            Segment::CatchAll(name) => parts.push(format!(":{}*", name)),
            Segment::Invisible => {}
            Segment::Private => return None,
        }
    }
    Some(format!("/{}", parts.join("/")))
}

/// Recognise a route file by its project-relative path
pub fn classify_route_file(relative: &Path) -> Option<RouteFile> {
    let extension = relative.extension()?.to_str()?;
    if !ROUTE_EXTENSIONS.contains(&extension) {
        return None;
    }
    let stem = relative.file_stem()?.to_str()?;

    let components: Vec<&str> = relative
        .parent()?
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => part.to_str(),
            _ => None,
        })
        .collect();

    if stem == "route" {
        // Innermost `app`, so a workspace package named `app` is not the router root
        if let Some(app) = components.iter().rposition(|c| *c == "app") {
            let path = segments_to_path(components[app + 1..].iter().copied())?;
            return Some(RouteFile {
                kind: RouterKind::AppRouter,
                path,
            });
        }
    }

    let pages = components.iter().position(|c| *c == "pages")?;
    if components.get(pages + 1) != Some(&"api") || stem.starts_with('_') {
        return None;
    }
    let mut segments: Vec<&str> = components[pages + 1..].to_vec();
    if stem != "index" {
        segments.push(stem);
    }
    let path = segments_to_path(segments)?;
    Some(RouteFile {
        kind: RouterKind::PagesApi,
        path,
    })
}

/// HTTP methods a route file handles; `GET` when nothing is recognisable
pub fn infer_methods(kind: RouterKind, source: &str) -> Vec<HttpMethod> {
    let mut methods: Vec<HttpMethod> = match kind {
        RouterKind::AppRouter => {
            let direct = APP_EXPORT.captures_iter(source).map(|c| c[1].to_string());
            let listed = EXPORT_LIST.captures_iter(source).flat_map(|list| {
                EXPORT_ALIAS
                    .captures_iter(&list[1])
                    .map(|c| c[1].to_string())
                    .collect::<Vec<_>>()
            });
            direct.chain(listed).filter_map(|m| m.parse().ok()).collect()
        }
        RouterKind::PagesApi => PAGES_METHOD
            .captures_iter(source)
            .filter_map(|c| c[1].parse().ok())
            .collect(),
    };
    methods.sort();
    methods.dedup();
    if methods.is_empty() {
        methods.push(HttpMethod::Get);
    }
    methods
}

/// Endpoints declared by one route file
pub fn endpoints_for(route: &RouteFile, source: &str, file: &Path) -> Vec<DiscoveredEndpoint> {
    infer_methods(route.kind, source)
        .into_iter()
        .map(|method| DiscoveredEndpoint {
            method,
            path: route.path.clone(),
            file: file.to_path_buf(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn route_path(relative: &str) -> Option<String> {
        classify_route_file(Path::new(relative)).map(|r| r.path)
    }

    #[test]
    fn test_app_router_paths() {
        assert_eq!(route_path("app/api/health/route.ts").as_deref(), Some("/api/health"));
        assert_eq!(
            route_path("src/app/api/users/[id]/route.ts").as_deref(),
            Some("/api/users/:id")
        );
        assert_eq!(
            route_path("app/(marketing)/api/docs/[...slug]/route.js").as_deref(),
            Some("/api/docs/:slug*")
        );
        assert_eq!(
            route_path("app/shop/[[...filters]]/route.ts").as_deref(),
            Some("/shop/:filters*")
        );
        assert_eq!(route_path("app/@modal/feed/route.ts").as_deref(), Some("/feed"));
        assert_eq!(route_path("app/route.ts").as_deref(), Some("/"));
    }

    #[test]
    fn test_app_router_inside_workspace_package_named_app() {
        assert_eq!(
            route_path("packages/app/app/api/x/route.ts").as_deref(),
            Some("/api/x")
        );
        assert_eq!(
            route_path("apps/app/src/app/api/health/route.ts").as_deref(),
            Some("/api/health")
        );
    }

    #[test]
    fn test_private_folders_and_non_routes_ignored() {
        assert_eq!(route_path("app/_lib/route.ts"), None);
        assert_eq!(route_path("app/api/users/page.tsx"), None);
        assert_eq!(route_path("app/api/users/route.css"), None);
        assert_eq!(route_path("lib/route.ts"), None);
    }

    #[test]
    fn test_pages_api_paths() {
        assert_eq!(route_path("pages/api/hello.ts").as_deref(), Some("/api/hello"));
        assert_eq!(route_path("src/pages/api/users/index.ts").as_deref(), Some("/api/users"));
        assert_eq!(
            route_path("pages/api/posts/[postId].js").as_deref(),
            Some("/api/posts/:postId")
        );
        assert_eq!(route_path("pages/about.tsx"), None);
        assert_eq!(route_path("pages/api/_middleware.ts"), None);
    }

    #[test]
    fn test_app_router_methods() {
        let source = r#"
            import { NextResponse } from "next/server";
            export async function GET(req: Request) { return NextResponse.json([]) }
            export const POST = withAuth(async (req) => {});
        "#;
        assert_eq!(
            infer_methods(RouterKind::AppRouter, source),
            vec![HttpMethod::Get, HttpMethod::Post]
        );

        let reexport = "const handler = NextAuth(opts);\nexport { handler as GET, handler as POST };";
        assert_eq!(
            infer_methods(RouterKind::AppRouter, reexport),
            vec![HttpMethod::Get, HttpMethod::Post]
        );
    }

    #[test]
    fn test_pages_methods_and_default() {
        let source = r#"
            export default function handler(req, res) {
              if (req.method === 'POST') { return res.status(201).end() }
              switch (req.method) { case "DELETE": break; }
            }
        "#;
        assert_eq!(
            infer_methods(RouterKind::PagesApi, source),
            vec![HttpMethod::Post, HttpMethod::Delete]
        );
        assert_eq!(
            infer_methods(RouterKind::PagesApi, "export default (req, res) => res.json({})"),
            vec![HttpMethod::Get]
        );
    }

    #[test]
    fn test_endpoint_params() {
        let route = classify_route_file(Path::new("app/api/users/[id]/route.ts")).unwrap();
        let endpoints = endpoints_for(&route, "export function DELETE() {}", Path::new("x"));
        assert_eq!(endpoints.len(), 1);
        assert_eq!(endpoints[0].method, HttpMethod::Delete);
        assert!(endpoints[0].has_params());
    }
}
