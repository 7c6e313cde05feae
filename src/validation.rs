//! Field checks shared by the account and profile endpoints.
//! Each returns the user-facing message on failure.

use regex::Regex;

lazy_static::lazy_static! {
    static ref EMAIL_REGEX: Regex =
        Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap();
    static ref URL_REGEX: Regex =
        Regex::new(r"^https?://[^\s/$.?#][^\s]*$").unwrap();
}

pub const MIN_USERNAME_CHARS: usize = 3;
pub const MIN_PASSWORD_CHARS: usize = 6;

pub fn username(value: &str) -> Result<(), &'static str> {
    if value.trim().chars().count() < MIN_USERNAME_CHARS {
        return Err("Uživatelské jméno musí mít alespoň 3 znaky");
    }
    Ok(())
}

pub fn email(value: &str) -> Result<(), &'static str> {
    if !EMAIL_REGEX.is_match(value.trim()) {
        return Err("Neplatný formát e-mailu");
    }
    Ok(())
}

pub fn password(value: &str) -> Result<(), &'static str> {
    if value.chars().count() < MIN_PASSWORD_CHARS {
        return Err("Heslo musí mít alespoň 6 znaků");
    }
    Ok(())
}

pub fn url(value: &str) -> Result<(), &'static str> {
    if !URL_REGEX.is_match(value.trim()) {
        return Err("Neplatná URL adresa");
    }
    Ok(())
}

/// Strips markup a profile bio or event description must not carry.
pub fn sanitize_text(text: &str) -> String {
    ammonia::clean(text)
}
