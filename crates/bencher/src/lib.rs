use bytes::Bytes;
use http::{Method, Request};
use http_body_util::Full;
use indoc::indoc;
use micro_bind::{FilePart, Get, PathParams, Post, Put, record};
use serde::{Deserialize, Serialize};

#[derive(Debug, Copy, Clone)]
pub struct TestCase {
    name: &'static str,
    group: TestGroup,
    fixture: Fixture,
}

impl TestCase {
    pub fn new(name: &'static str, group: TestGroup, fixture: Fixture) -> Self {
        Self { name, group, fixture }
    }

    pub fn small(name: &'static str, fixture: Fixture) -> Self {
        Self::new(name, TestGroup::Small, fixture)
    }

    pub fn normal(name: &'static str, fixture: Fixture) -> Self {
        Self::new(name, TestGroup::Normal, fixture)
    }

    pub fn large(name: &'static str, fixture: Fixture) -> Self {
        Self::new(name, TestGroup::Large, fixture)
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn group(&self) -> TestGroup {
        self.group
    }

    pub fn fixture(&self) -> &Fixture {
        &self.fixture
    }
}

/// A request as it reaches a handler: the router already extracted path params.
#[derive(Debug, Copy, Clone)]
pub struct Fixture {
    method: &'static str,
    uri: &'static str,
    headers: &'static [(&'static str, &'static str)],
    path_params: &'static [(&'static str, &'static str)],
    body: &'static str,
}

impl Fixture {
    pub const fn new(
        method: &'static str,
        uri: &'static str,
        headers: &'static [(&'static str, &'static str)],
        path_params: &'static [(&'static str, &'static str)],
        body: &'static str,
    ) -> Self {
        Self { method, uri, headers, path_params, body }
    }

    /// Size of the request line, headers and body.
    pub fn len(&self) -> usize {
        let headers: usize = self.headers.iter().map(|(name, value)| name.len() + value.len() + 4).sum();
        self.method.len() + self.uri.len() + headers + self.body.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn request(&self) -> Request<Full<Bytes>> {
        let method = Method::from_bytes(self.method.as_bytes()).unwrap_or_default();
        let mut builder = Request::builder().method(method).uri(self.uri);
        for (name, value) in self.headers {
            builder = builder.header(*name, *value);
        }
        builder.body(Full::new(Bytes::from_static(self.body.as_bytes()))).expect("fixture should be a valid request")
    }

    pub fn path_params(&self) -> PathParams {
        self.path_params.iter().copied().collect()
    }
}

#[derive(Clone, Copy, Debug)]
pub enum TestGroup {
    Small,
    Normal,
    Large,
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct Address {
    pub street: String,
    pub city: String,
    pub zip: String,
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub name: String,
    pub email: String,
    pub age: u8,
    pub tags: Vec<String>,
    pub addresses: Vec<Address>,
}

record! {
    #[derive(Debug, Default, Clone)]
    pub struct SearchUsers {
        _get: Get => embed,
        pub page: u32 => query,
        pub size: u32 => query(validate = "max=100"),
        pub sort: String => query(validate = "oneof=name age"),
        pub tags: Vec<String> => query(name = "tag"),
        pub locale: Vec<String> => header(name = "accept-language"),
        pub request_id: String => header(name = "x-request-id"),
        pub session: String => cookie(name = "sid"),
    }
}

record! {
    #[derive(Debug, Default, Clone)]
    pub struct UpdateProfile {
        _put: Put => embed,
        pub id: u64 => path(validate = "required"),
        pub dry_run: bool => query,
        pub request_id: String => header(name = "x-request-id"),
        pub profile: Profile => body(validate = "required"),
    }
}

record! {
    #[derive(Debug, Default, Clone)]
    pub struct UploadAvatar {
        _post: Post => embed,
        pub id: u64 => path,
        pub caption: String => form,
        pub avatar: FilePart => multipart,
    }
}

pub static SEARCH: Fixture = Fixture::new(
    "GET",
    "/users?page=3&size=50&sort=name&tag=admin&tag=staff&tag=ops",
    &[
        ("accept-language", "en-US"),
        ("accept-language", "de-DE"),
        ("x-request-id", "7b1c3e0a-57c4-4a43-9b0e-2f8f0c3b9e11"),
        ("cookie", "theme=dark; sid=4f1d0c2a9b; lang=en"),
    ],
    &[],
    "",
);

pub static UPDATE: Fixture = Fixture::new(
    "PUT",
    "/users/42?dry_run=true",
    &[("content-type", "application/json"), ("x-request-id", "a1")],
    &[("id", "42")],
    indoc! {r#"
        {
          "name": "Ada Lovelace",
          "email": "ada@example.com",
          "age": 36,
          "tags": ["math", "engines", "poetry"],
          "addresses": [
            {"street": "12 St James's Square", "city": "London", "zip": "SW1Y 4JH"},
            {"street": "Ockham Park", "city": "Ockham", "zip": "GU23 6NP"}
          ]
        }
    "#},
);

pub static UPLOAD: Fixture = Fixture::new(
    "POST",
    "/users/42/avatar",
    &[("content-type", "multipart/form-data; boundary=bench-boundary")],
    &[("id", "42")],
    concat!(
        "--bench-boundary\r\n",
        "Content-Disposition: form-data; name=\"caption\"\r\n",
        "\r\n",
        "me at the lake\r\n",
        "--bench-boundary\r\n",
        "Content-Disposition: form-data; name=\"avatar\"; filename=\"me.png\"\r\n",
        "Content-Type: image/png\r\n",
        "\r\n",
        "\u{89}PNG fake image bytes for the benchmark, long enough to matter a little\r\n",
        "--bench-boundary--\r\n",
    ),
);

pub fn search_users() -> SearchUsers {
    SearchUsers {
        page: 3,
        size: 50,
        sort: "name".into(),
        tags: vec!["admin".into(), "staff".into(), "ops".into()],
        locale: vec!["en-US".into(), "de-DE".into()],
        request_id: "7b1c3e0a-57c4-4a43-9b0e-2f8f0c3b9e11".into(),
        session: "4f1d0c2a9b".into(),
        ..Default::default()
    }
}

pub fn update_profile() -> UpdateProfile {
    UpdateProfile {
        id: 42,
        dry_run: true,
        request_id: "a1".into(),
        profile: Profile {
            name: "Ada Lovelace".into(),
            email: "ada@example.com".into(),
            age: 36,
            tags: vec!["math".into(), "engines".into(), "poetry".into()],
            addresses: vec![Address { street: "Ockham Park".into(), city: "Ockham".into(), zip: "GU23 6NP".into() }],
        },
        ..Default::default()
    }
}

pub fn upload_avatar() -> UploadAvatar {
    UploadAvatar {
        id: 42,
        caption: "me at the lake".into(),
        avatar: FilePart::new("me.png", Bytes::from_static(&[0x89, b'P', b'N', b'G', 0, 1, 2, 3]))
            .with_content_type("image/png"),
        ..Default::default()
    }
}
