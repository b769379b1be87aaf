//! Refresh Cookie Handling

use std::time::Duration;

use tower_cookies::{
    cookie::{time, CookieBuilder, SameSite},
    Cookie, Cookies,
};

pub const REFRESH_COOKIE: &str = "refreshToken";

/// Attributes applied to the refresh token cookie
#[derive(Debug, Clone)]
pub struct CookiePolicy {
    pub secure: bool,
    pub max_age: Duration,
}

impl CookiePolicy {
    pub fn new(secure: bool, max_age: Duration) -> Self {
        Self { secure, max_age }
    }

    /// Cookie delivering a refresh token
    pub fn refresh_cookie(&self, token: String) -> Cookie<'static> {
        let max_age = time::Duration::try_from(self.max_age).unwrap_or(time::Duration::MAX);
        self.builder(token).max_age(max_age).build()
    }

    /// Attach a freshly issued refresh token to the response
    pub fn set_refresh(&self, cookies: &Cookies, token: String) {
        cookies.add(self.refresh_cookie(token));
    }

    /// Expire the refresh cookie if the browser sent one
    pub fn clear(&self, cookies: &Cookies) {
        cookies.remove(self.builder(String::new()).build());
    }

    // Browsers only drop the cookie when the removal carries the same path
    fn builder(&self, value: String) -> CookieBuilder<'static> {
        Cookie::build((REFRESH_COOKIE, value))
            .http_only(true)
            .same_site(SameSite::Strict)
            .secure(self.secure)
            .path("/")
    }
}

/// Refresh token presented in the request cookies
pub fn presented_refresh_token(cookies: &Cookies) -> Option<String> {
    cookies
        .get(REFRESH_COOKIE)
        .map(|cookie| cookie.value().to_string())
}
