use chrono::NaiveDate;
use shared::{domain::NotificationKind, protocol::NotificationReservation};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailContent {
    pub subject: String,
    pub html: String,
}

/// "Saturday, June 1, 2024"
pub fn long_date(date: NaiveDate) -> String {
    date.format("%A, %B %-d, %Y").to_string()
}

pub fn render(
    kind: NotificationKind,
    reservation: &NotificationReservation,
    restaurant_name: &str,
) -> EmailContent {
    let name = escape_html(&reservation.name);
    let restaurant = escape_html(restaurant_name);
    let date = long_date(reservation.date);
    let time = reservation.time;
    let guests = reservation.guests;
    let table = reservation.table_number;

    match kind {
        NotificationKind::New => EmailContent {
            subject: format!("Reservation Received - {restaurant_name}"),
            html: format!(
                "<h1>Thank you for your reservation, {name}!</h1>\
                 <p>We have received your reservation request for:</p>\
                 <ul><li>Date: {date}</li><li>Time: {time}</li>\
                 <li>Number of guests: {guests}</li><li>Table: {table}</li></ul>\
                 <p>We will review your reservation and confirm it shortly.</p>\
                 <p>Best regards,<br>{restaurant} Team</p>"
            ),
        },
        NotificationKind::Confirmed => EmailContent {
            subject: format!("Reservation Confirmed - {restaurant_name}"),
            html: format!(
                "<h1>Your reservation is confirmed, {name}!</h1>\
                 <p>We're looking forward to seeing you on:</p>\
                 <ul><li>Date: {date}</li><li>Time: {time}</li>\
                 <li>Number of guests: {guests}</li><li>Table: {table}</li></ul>\
                 <p>See you soon!</p>\
                 <p>Best regards,<br>{restaurant} Team</p>"
            ),
        },
        // The table is released, so it is left out.
        NotificationKind::Cancelled => EmailContent {
            subject: format!("Reservation Cancelled - {restaurant_name}"),
            html: format!(
                "<h1>Reservation Cancelled</h1>\
                 <p>Dear {name},</p>\
                 <p>Unfortunately, we were unable to accommodate your reservation for:</p>\
                 <ul><li>Date: {date}</li><li>Time: {time}</li>\
                 <li>Number of guests: {guests}</li></ul>\
                 <p>We apologize for any inconvenience caused.</p>\
                 <p>Best regards,<br>{restaurant} Team</p>"
            ),
        },
    }
}

fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}
