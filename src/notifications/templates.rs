pub struct NotificationTemplates;

impl NotificationTemplates {
    /// HTML body for the password-reset email.
    pub fn password_reset_email(user_name: &str, reset_link: &str) -> String {
        format!(
            r#"
<!DOCTYPE html>
<html>
<head>
    <style>
        body {{ font-family: 'Helvetica Neue', Helvetica, Arial, sans-serif; line-height: 1.6; color: #333; }}
        .container {{ max-width: 600px; margin: 0 auto; padding: 20px; border: 1px solid #ddd; border-radius: 8px; }}
        .header {{ background-color: #dfe6e9; padding: 15px; border-radius: 8px 8px 0 0; text-align: center; }}
        .header h1 {{ margin: 0; color: #2d3436; }}
        .content {{ padding: 20px; }}
        .button {{ display: inline-block; background-color: #0984e3; color: white; padding: 10px 20px; text-decoration: none; border-radius: 5px; font-weight: bold; }}
        .footer {{ margin-top: 30px; font-size: 12px; color: #b2bec3; text-align: center; }}
    </style>
</head>
<body>
    <div class="container">
        <div class="header">
            <h1>FormCheck Password Reset</h1>
        </div>
        <div class="content">
            <p>Hi {user_name},</p>
            <p>We received a request to reset your FormCheck password. Click the
            button below to choose a new one.</p>
            <div style="text-align: center; margin-top: 30px;">
                <a href="{reset_link}" class="button">Reset Password</a>
            </div>
            <p style="text-align: center; margin-top: 20px;">
                <small>This link expires in 1 hour. If you did not request a reset, you can ignore this email.</small>
            </p>
        </div>
        <div class="footer">
            <p>Sent by FormCheck</p>
        </div>
    </div>
</body>
</html>
"#,
            user_name = user_name,
            reset_link = reset_link
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_email_embeds_name_and_link() {
        let body = NotificationTemplates::password_reset_email(
            "ana",
            "http://localhost:3000/update-password?token=abc",
        );
        assert!(body.contains("Hi ana"));
        assert!(body.contains("update-password?token=abc"));
    }
}
