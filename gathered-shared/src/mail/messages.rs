/// Message bodies for the registration emails

use super::Email;

/// Subject shared by both confirmation emails
pub const CONFIRMATION_SUBJECT: &str = "GatherEd Account Confirmation";

/// Email carrying a one-time verification code
pub fn verification_code(to: &str, name: &str, code: &str, ttl_minutes: i64) -> Email {
    let text = format!(
        "Hi {name},\n\n\
         Your GatherEd confirmation code is {code}.\n\
         It expires in {ttl_minutes} minutes.\n\n\
         If you did not sign up, you can ignore this message."
    );
    let html = format!(
        "<p>Hi {name},</p>\
         <p>Your GatherEd confirmation code is <strong>{code}</strong>.</p>\
         <p>It expires in {ttl_minutes} minutes.</p>\
         <p>If you did not sign up, you can ignore this message.</p>",
        name = escape(name),
    );

    Email {
        to: to.to_string(),
        to_name: Some(name.to_string()),
        subject: CONFIRMATION_SUBJECT.to_string(),
        text,
        html: Some(html),
    }
}

/// Email carrying a confirmation link
pub fn confirmation_link(to: &str, link: &str, ttl_hours: i64) -> Email {
    let text = format!(
        "Confirm your GatherEd account by opening this link:\n\n{link}\n\n\
         The link expires in {ttl_hours} hours."
    );
    let html = format!(
        "<p>Confirm your GatherEd account:</p>\
         <p><a href=\"{link}\">Confirm my account</a></p>\
         <p>The link expires in {ttl_hours} hours.</p>",
        link = escape(link),
    );

    Email {
        to: to.to_string(),
        to_name: None,
        subject: CONFIRMATION_SUBJECT.to_string(),
        text,
        html: Some(html),
    }
}

fn escape(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_email_contains_code() {
        let email = verification_code("a@x.edu", "Ada <3", "123456", 10);

        assert_eq!(email.subject, CONFIRMATION_SUBJECT);
        assert!(email.text.contains("123456"));
        assert!(email.html.as_deref().unwrap().contains("Ada &lt;3"));
    }

    #[test]
    fn test_link_email_contains_link() {
        let email = confirmation_link("a@x.edu", "http://localhost/auth/callback?token=t", 24);
        assert!(email.text.contains("token=t"));
        assert_eq!(email.to, "a@x.edu");
    }
}
