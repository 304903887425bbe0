//! Inputs shared by the wisp benchmarks.

/// A raw HTTP request fed to the decoder.
#[derive(Debug, Copy, Clone)]
pub struct RequestFixture {
    name: &'static str,
    size: FixtureSize,
    raw: &'static str,
}

impl RequestFixture {
    pub const fn new(name: &'static str, size: FixtureSize, raw: &'static str) -> Self {
        Self { name, size, raw }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn size(&self) -> FixtureSize {
        self.size
    }

    pub fn raw(&self) -> &'static str {
        self.raw
    }

    pub fn len(&self) -> usize {
        self.raw.len()
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FixtureSize {
    Small,
    Large,
}

pub static GET_SMALL: RequestFixture =
    RequestFixture::new("get_small", FixtureSize::Small, include_str!("../resources/request/get_small.txt"));

pub static GET_LARGE: RequestFixture =
    RequestFixture::new("get_large", FixtureSize::Large, include_str!("../resources/request/get_large.txt"));

pub static POST_FORM: RequestFixture =
    RequestFixture::new("post_form", FixtureSize::Small, include_str!("../resources/request/post_form.txt"));

pub fn request_fixtures() -> [RequestFixture; 3] {
    [GET_SMALL, GET_LARGE, POST_FORM]
}

/// Paths matched against the benchmark route table, hits and misses mixed.
pub const ROUTE_PATHS: &[&str] =
    &["/", "index.html", "post/123", "post/123/comments/9", "vhost/post/1", "static/css/site.css", "no/such/page"];
