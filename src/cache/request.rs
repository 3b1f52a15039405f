// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

use std::fmt;
use std::sync::Arc;

/// The scheme and authority assets are served from, e.g. `http://localhost:8080`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Origin(String);

impl Origin {
    /// Creates an origin. Any trailing slash is dropped.
    pub fn new(origin: &str) -> Origin {
        Origin(origin.trim_end_matches('/').to_string())
    }

    /// Returns the origin as a string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A GET request for an asset, resolved to an origin and an absolute path.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Request {
    origin: Origin,
    path: String,
}

impl Request {
    /// Resolves a locator against the base origin. Absolute URLs keep their own origin;
    /// anything else (`./style.css`, `images/icon.png`, `/app.js`) is a path on `base`.
    pub fn resolve(base: &Origin, locator: &str) -> Request {
        if let Some((scheme, rest)) = locator.split_once("://") {
            let (authority, path) = match rest.find('/') {
                Some(slash) => rest.split_at(slash),
                None => (rest, "/"),
            };
            return Request {
                origin: Origin::new(&format!("{}://{}", scheme, authority)),
                path: normalize_path(path),
            };
        }

        Request {
            origin: base.clone(),
            path: normalize_path(locator),
        }
    }

    /// Returns the request origin.
    pub fn origin(&self) -> &Origin {
        &self.origin
    }

    /// Returns the absolute request path.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Returns the full URL, which is also the cache key.
    pub fn url(&self) -> String {
        format!("{}{}", self.origin, self.path)
    }
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.origin, self.path)
    }
}

/// Collapses `.` and `..` segments and makes the path absolute. A trailing slash is kept, so
/// `./` stays the directory index `/`. `..` never climbs above the root.
fn normalize_path(path: &str) -> String {
    let path = path.split(['?', '#']).next().unwrap_or_default();
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            segment => segments.push(segment),
        }
    }

    let mut normalized = format!("/{}", segments.join("/"));
    if path.ends_with('/') && normalized != "/" {
        normalized.push('/');
    }
    normalized
}

/// A response body with its status. Cloning is cheap; the body is shared.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Response {
    status: u16,
    body: Arc<[u8]>,
}

impl Response {
    /// Creates a new response.
    pub fn new(status: u16, body: impl Into<Arc<[u8]>>) -> Response {
        Response {
            status,
            body: body.into(),
        }
    }

    /// Returns the status code.
    pub fn status(&self) -> u16 {
        self.status
    }

    /// Returns true for 2xx statuses.
    pub fn ok(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Returns the body.
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Returns a shared handle to the body.
    pub fn shared_body(&self) -> Arc<[u8]> {
        self.body.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Origin {
        Origin::new("http://localhost/")
    }

    #[test]
    fn test_resolve_relative() {
        let cases = [
            ("./", "/"),
            ("./style.css", "/style.css"),
            ("./note/1.mp3", "/note/1.mp3"),
            ("images/xylophone.png", "/images/xylophone.png"),
            ("/app.js", "/app.js"),
            ("./note/../app.js", "/app.js"),
            ("../../etc/passwd", "/etc/passwd"),
            ("./note/", "/note/"),
            ("./app.js?v=2", "/app.js"),
        ];
        for (locator, path) in cases {
            let request = Request::resolve(&base(), locator);
            assert_eq!(request.origin(), &base(), "{}", locator);
            assert_eq!(request.path(), path, "{}", locator);
        }
    }

    #[test]
    fn test_resolve_absolute() {
        let request = Request::resolve(&base(), "https://fonts.example.com/css?family=x");
        assert_eq!(request.origin().as_str(), "https://fonts.example.com");
        assert_eq!(request.path(), "/css");

        let request = Request::resolve(&base(), "http://localhost");
        assert_eq!(request.origin(), &base());
        assert_eq!(request.path(), "/");
        assert_eq!(request.url(), "http://localhost/");
    }

    #[test]
    fn test_response_ok() {
        assert!(Response::new(200, Vec::<u8>::new()).ok());
        assert!(!Response::new(404, Vec::<u8>::new()).ok());
        let response = Response::new(200, b"abc".to_vec());
        let copy = response.clone();
        assert_eq!(copy.body(), b"abc");
        assert!(Arc::ptr_eq(&response.shared_body(), &copy.shared_body()));
    }
}
