//! Outgoing mail: message construction and delivery through lettre.

use async_trait::async_trait;
use lettre::{
    AsyncFileTransport, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{Mailbox, header::ContentType},
    transport::smtp::authentication::Credentials,
};
use std::path::Path;

use crate::{
    booking::workflow::Confirmation,
    config::{EmailConfig, EmailTransportConfig},
    errors::Error,
    types::DATE_FORMAT,
};

/// A message ready for delivery. `from` and `to` accept either `addr` or `Name <addr>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailData {
    pub to: String,
    pub from: String,
    pub subject: String,
    pub html_body: String,
}

/// Delivers one message. Implementations must be safe to call from the mail worker task.
#[async_trait]
pub trait MailSender: Send + Sync {
    async fn send(&self, mail: &MailData) -> Result<(), Error>;
}

pub struct EmailService {
    transport: EmailTransport,
}

enum EmailTransport {
    Smtp(AsyncSmtpTransport<Tokio1Executor>),
    File(AsyncFileTransport<Tokio1Executor>),
}

impl EmailService {
    pub fn new(config: &EmailConfig) -> Result<Self, Error> {
        let transport = match &config.transport {
            EmailTransportConfig::Smtp {
                host,
                port,
                username,
                password,
                use_tls,
            } => {
                if !use_tls {
                    tracing::warn!("SMTP TLS is disabled - this is not recommended for production");
                }

                let mut smtp_builder = if *use_tls {
                    AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
                } else {
                    Ok(AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host))
                }
                .map_err(|e| Error::Internal {
                    operation: format!("create SMTP transport: {e}"),
                })?
                .port(*port);

                if let (Some(username), Some(password)) = (username, password) {
                    smtp_builder = smtp_builder.credentials(Credentials::new(username.clone(), password.clone()));
                }

                EmailTransport::Smtp(smtp_builder.build())
            }
            EmailTransportConfig::File { path } => {
                // Use file transport for development/testing
                let emails_dir = Path::new(path);
                if !emails_dir.exists() {
                    std::fs::create_dir_all(emails_dir).map_err(|e| Error::Internal {
                        operation: format!("create emails directory: {e}"),
                    })?;
                }
                EmailTransport::File(AsyncFileTransport::<Tokio1Executor>::new(emails_dir))
            }
        };

        Ok(Self { transport })
    }
}

#[async_trait]
impl MailSender for EmailService {
    async fn send(&self, mail: &MailData) -> Result<(), Error> {
        let from = mail.from.parse::<Mailbox>().map_err(|e| Error::Internal {
            operation: format!("parse from email: {e}"),
        })?;
        let to = mail.to.parse::<Mailbox>().map_err(|e| Error::Internal {
            operation: format!("parse to email: {e}"),
        })?;

        let message = Message::builder()
            .from(from)
            .to(to)
            .subject(mail.subject.as_str())
            .header(ContentType::TEXT_HTML)
            .body(mail.html_body.clone())
            .map_err(|e| Error::Internal {
                operation: format!("build email message: {e}"),
            })?;

        match &self.transport {
            EmailTransport::Smtp(smtp) => {
                smtp.send(message).await.map_err(|e| Error::Internal {
                    operation: format!("send SMTP email: {e}"),
                })?;
            }
            EmailTransport::File(file) => {
                file.send(message).await.map_err(|e| Error::Internal {
                    operation: format!("send file email: {e}"),
                })?;
            }
        }

        Ok(())
    }
}

fn sender(config: &EmailConfig) -> String {
    format!("{} <{}>", config.from_name, config.from_email)
}

fn escape_html(raw: &str) -> String {
    raw.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}

/// Confirmation sent to the guest once the reservation is committed
pub fn guest_confirmation(config: &EmailConfig, confirmation: &Confirmation) -> MailData {
    let guest = &confirmation.guest;
    let stay = &confirmation.choice.stay;
    let first_name = escape_html(&guest.first_name);
    let room_name = escape_html(&confirmation.choice.room_name);
    let arrival = stay.start().format(DATE_FORMAT);
    let departure = stay.end().format(DATE_FORMAT);
    let nights = stay.nights();
    let reservation_id = confirmation.reservation_id;

    let html_body = format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <title>Reservation Confirmation</title>
    <style>
        body {{ font-family: Arial, sans-serif; line-height: 1.6; color: #333; }}
        .container {{ max-width: 600px; margin: 0 auto; padding: 20px; }}
        .footer {{ margin-top: 30px; font-size: 12px; color: #666; }}
    </style>
</head>
<body>
    <div class="container">
        <h2>Reservation Confirmation</h2>

        <p>Dear {first_name},</p>

        <p>This is to confirm your reservation of the <strong>{room_name}</strong>.</p>

        <ul>
            <li>Arrival: {arrival}</li>
            <li>Departure: {departure}</li>
            <li>Nights: {nights}</li>
            <li>Reservation number: {reservation_id}</li>
        </ul>

        <div class="footer">
            <p>This is an automated message, please do not reply to this email.</p>
        </div>
    </div>
</body>
</html>"#
    );

    MailData {
        to: guest.email.clone(),
        from: sender(config),
        subject: "Reservation Confirmation".to_string(),
        html_body,
    }
}

/// Notification for the property owner, when `email.owner_email` is configured
pub fn owner_notification(config: &EmailConfig, confirmation: &Confirmation) -> Option<MailData> {
    let owner = config.owner_email.as_ref()?;
    let guest = &confirmation.guest;
    let stay = &confirmation.choice.stay;

    let html_body = format!(
        r#"<strong>Reservation Notification</strong><br>
A reservation has been made for the {room} from {arrival} to {departure}.<br>
Guest: {first} {last} ({email}, {phone})<br>
Reservation number: {id}"#,
        room = escape_html(&confirmation.choice.room_name),
        arrival = stay.start().format(DATE_FORMAT),
        departure = stay.end().format(DATE_FORMAT),
        first = escape_html(&guest.first_name),
        last = escape_html(&guest.last_name),
        email = escape_html(&guest.email),
        phone = escape_html(&guest.phone),
        id = confirmation.reservation_id,
    );

    Some(MailData {
        to: owner.clone(),
        from: sender(config),
        subject: format!("Reservation Notification: {}", confirmation.choice.room_name),
        html_body,
    })
}
