//! Input validation utilities

use regex::Regex;
use std::sync::OnceLock;

/// Validate a tour name
pub fn validate_tour_name(name: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err("A tour must have a name".to_string());
    }

    let len = name.chars().count();
    if len < 10 {
        return Err("A tour name must have more or equal than 10 characters".to_string());
    }

    if len > 40 {
        return Err("A tour name must have less or equal than 40 characters".to_string());
    }

    Ok(())
}

/// Validate email
pub fn validate_email(email: &str) -> Result<(), String> {
    if email.is_empty() {
        return Err("Please input your email!".to_string());
    }

    if email.len() > 254 {
        return Err("Email must be at most 254 characters long".to_string());
    }

    static EMAIL_REGEX: OnceLock<Regex> = OnceLock::new();
    let regex = EMAIL_REGEX.get_or_init(|| {
        Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$")
            .expect("Failed to compile email regex")
    });

    if !regex.is_match(email) {
        return Err("Please provide a valid email".to_string());
    }

    Ok(())
}

/// Validate password
pub fn validate_password(password: &str) -> Result<(), String> {
    if password.is_empty() {
        return Err("Please input your password!".to_string());
    }

    if password.chars().count() < 8 {
        return Err("Password must be at least 8 characters long".to_string());
    }

    Ok(())
}

/// Validate the confirmation matches
pub fn validate_password_confirm(password: &str, confirm: Option<&str>) -> Result<(), String> {
    match confirm {
        None | Some("") => Err("Please confirm your password!".to_string()),
        Some(confirm) if confirm != password => Err("Passwords do not match".to_string()),
        Some(_) => Ok(()),
    }
}

/// Validate a review rating
pub fn validate_rating(rating: i32) -> Result<(), String> {
    if !(1..=5).contains(&rating) {
        return Err("Rating must be between 1 and 5".to_string());
    }
    Ok(())
}

/// Validate a tour ratings average
pub fn validate_ratings_average(average: f64) -> Result<(), String> {
    if average < 1.0 {
        return Err("Rating must be above 1.0".to_string());
    }
    if average > 5.0 {
        return Err("Rating must be below 5.0".to_string());
    }
    Ok(())
}

/// Validate the discount stays below the price
pub fn validate_price_discount(discount: Option<f64>, price: f64) -> Result<(), String> {
    match discount {
        Some(discount) if discount >= price => Err(format!(
            "Discount price ({}) must be less than the base price",
            discount
        )),
        _ => Ok(()),
    }
}

/// Collect failures from several checks
#[derive(Debug, Default)]
pub struct Violations(Vec<String>);

impl Violations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn check(&mut self, result: Result<(), String>) -> &mut Self {
        if let Err(message) = result {
            self.0.push(message);
        }
        self
    }

    pub fn require(&mut self, present: bool, message: &str) -> &mut Self {
        if !present {
            self.0.push(message.to_string());
        }
        self
    }

    pub fn into_result(self) -> Result<(), Vec<String>> {
        if self.0.is_empty() {
            Ok(())
        } else {
            Err(self.0)
        }
    }
}
