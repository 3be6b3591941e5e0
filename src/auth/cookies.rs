//! Cookie plumbing for the token pair. Both cookies are httpOnly,
//! SameSite=Strict and scoped to `/`; `Secure` everywhere but development.

use tower_cookies::cookie::time::Duration;
use tower_cookies::cookie::SameSite;
use tower_cookies::{Cookie, Cookies};

use crate::security::jwt::TokenPair;

pub const ACCESS_TOKEN_COOKIE: &str = "access_token";
pub const REFRESH_TOKEN_COOKIE: &str = "refresh_token";

fn build_cookie(name: &'static str, value: String, max_age_secs: i64, secure: bool) -> Cookie<'static> {
    Cookie::build((name, value))
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Strict)
        .max_age(Duration::seconds(max_age_secs))
        .build()
}

pub fn set_token_pair(cookies: &Cookies, pair: &TokenPair, secure: bool) {
    cookies.add(build_cookie(
        ACCESS_TOKEN_COOKIE,
        pair.access_token.clone(),
        pair.expires_in,
        secure,
    ));
    cookies.add(build_cookie(
        REFRESH_TOKEN_COOKIE,
        pair.refresh_token.clone(),
        pair.refresh_expires_in,
        secure,
    ));
}

/// Removal cookies must carry the same attributes they were set with,
/// otherwise browsers keep the originals.
pub fn clear_auth_cookies(cookies: &Cookies, secure: bool) {
    cookies.remove(build_cookie(ACCESS_TOKEN_COOKIE, String::new(), 0, secure));
    cookies.remove(build_cookie(REFRESH_TOKEN_COOKIE, String::new(), 0, secure));
}
