use chrono::NaiveDate;
use shared::{
    domain::{
        NewReservation, NotificationKind, Reservation, SeatingArea, TimeSlot, MAX_GUESTS,
        MIN_GUESTS,
    },
    protocol::{CreateReservationRequest, ServerEvent, Warning},
};
use thiserror::Error;
use tracing::{info, warn};

use crate::{cart::Cart, catalog::MenuCatalog, notify_best_effort, ApiContext, StoreError};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("please select a date")]
    MissingDate,
    #[error("please select a time")]
    MissingTime,
    #[error("please select a seating area")]
    MissingSeatingArea,
    #[error("please select a table")]
    MissingTable,
    #[error("table {0} does not exist")]
    UnknownTable(u32),
    #[error("table {table_number} is not in the {area} seating area")]
    TableNotInArea {
        table_number: u32,
        area: &'static str,
    },
    #[error("please enter the number of guests")]
    MissingGuests,
    #[error("number of guests must be between 1 and 8, got {0}")]
    GuestsOutOfRange(u8),
    #[error("please enter your {0}")]
    MissingContact(&'static str),
    #[error("menu item {0} is not on the menu")]
    UnknownMenuItem(i64),
    #[error("quantity for menu item {0} must be at least 1")]
    ZeroQuantity(i64),
}

#[derive(Debug, Error)]
pub enum FormError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Field values as the guest has entered them so far.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReservationDraft {
    pub date: Option<NaiveDate>,
    pub time: Option<TimeSlot>,
    pub seating_area: Option<SeatingArea>,
    pub table_number: Option<u32>,
    pub guests: Option<u8>,
    pub name: String,
    pub email: String,
    pub phone: String,
}

#[derive(Debug, Clone)]
pub struct Submission {
    pub reservation: Reservation,
    pub warnings: Vec<Warning>,
}

pub struct ReservationForm {
    catalog: MenuCatalog,
    require_seating_area: bool,
    draft: ReservationDraft,
    cart: Cart,
}

impl ReservationForm {
    pub fn new(catalog: MenuCatalog) -> Self {
        Self {
            catalog,
            require_seating_area: false,
            draft: ReservationDraft::default(),
            cart: Cart::new(),
        }
    }

    pub fn require_seating_area(mut self, required: bool) -> Self {
        self.require_seating_area = required;
        self
    }

    /// Fills a fresh form from the public reservation endpoint's body.
    pub fn from_request(
        catalog: MenuCatalog,
        request: CreateReservationRequest,
    ) -> Result<Self, ValidationError> {
        let mut form = Self::new(catalog);
        form.draft = ReservationDraft {
            date: request.date,
            time: request.time,
            seating_area: request.seating_area,
            table_number: request.table_number,
            guests: request.guests,
            name: request.name,
            email: request.email,
            phone: request.phone,
        };
        for item in request.items {
            if item.quantity == 0 {
                return Err(ValidationError::ZeroQuantity(item.menu_item_id.0));
            }
            form.cart.add(item.menu_item_id, item.quantity);
        }
        Ok(form)
    }

    pub fn draft(&self) -> &ReservationDraft {
        &self.draft
    }

    pub fn draft_mut(&mut self) -> &mut ReservationDraft {
        &mut self.draft
    }

    pub fn cart(&self) -> &Cart {
        &self.cart
    }

    pub fn cart_mut(&mut self) -> &mut Cart {
        &mut self.cart
    }

    pub fn catalog(&self) -> &MenuCatalog {
        &self.catalog
    }

    pub fn reset(&mut self) {
        self.draft = ReservationDraft::default();
        self.cart.clear();
    }

    pub fn validate(&self) -> Result<NewReservation, ValidationError> {
        let draft = &self.draft;
        let date = draft.date.ok_or(ValidationError::MissingDate)?;
        let time = draft.time.ok_or(ValidationError::MissingTime)?;
        if self.require_seating_area && draft.seating_area.is_none() {
            return Err(ValidationError::MissingSeatingArea);
        }
        let table_number = draft.table_number.ok_or(ValidationError::MissingTable)?;
        match draft.seating_area {
            Some(area) if !area.contains_table(table_number) => {
                return Err(ValidationError::TableNotInArea {
                    table_number,
                    area: area.as_str(),
                });
            }
            None if SeatingArea::for_table(table_number).is_none() => {
                return Err(ValidationError::UnknownTable(table_number));
            }
            _ => {}
        }

        let guests = draft.guests.ok_or(ValidationError::MissingGuests)?;
        if !(MIN_GUESTS..=MAX_GUESTS).contains(&guests) {
            return Err(ValidationError::GuestsOutOfRange(guests));
        }

        let name = required(&draft.name, "name")?;
        let email = required(&draft.email, "email")?;
        let phone = required(&draft.phone, "phone number")?;

        let items = self.cart.line_items();
        if let Some(unknown) = items
            .iter()
            .find(|line| self.catalog.get(line.menu_item_id).is_none())
        {
            return Err(ValidationError::UnknownMenuItem(unknown.menu_item_id.0));
        }

        Ok(NewReservation {
            date,
            time,
            guests,
            name,
            email,
            phone,
            seating_area: draft.seating_area,
            table_number,
            items,
        })
    }

    /// Validates, persists and announces the reservation, then resets the form.
    ///
    /// Nothing is sent to the store or the dispatcher when validation fails.
    /// A failed notification or a failed follow-up line-item write does not
    /// fail the submission; both come back as warnings.
    pub async fn submit(&mut self, ctx: &ApiContext) -> Result<Submission, FormError> {
        let new_reservation = self.validate()?;
        let mut warnings = Vec::new();

        let reservation = if ctx.store.capabilities().atomic_line_items
            || new_reservation.items.is_empty()
        {
            ctx.store
                .create(&new_reservation)
                .await
                .map_err(StoreError)?
        } else {
            let header = NewReservation {
                items: Vec::new(),
                ..new_reservation.clone()
            };
            let mut created = ctx.store.create(&header).await.map_err(StoreError)?;
            match ctx
                .store
                .create_line_items(created.id, &new_reservation.items)
                .await
            {
                Ok(()) => created.items = new_reservation.items.clone(),
                Err(error) => {
                    warn!(
                        reservation_id = created.id.0,
                        error = %format!("{error:#}"),
                        "reservation saved without its pre-ordered items"
                    );
                    warnings.push(Warning::LineItemsNotSaved(format!(
                        "your table is booked but the pre-order could not be saved: {error:#}"
                    )));
                }
            }
            created
        };

        info!(
            reservation_id = reservation.id.0,
            date = %reservation.date,
            time = %reservation.time,
            guests = reservation.guests,
            "reservation created"
        );

        warnings.extend(notify_best_effort(ctx, NotificationKind::New, &reservation).await);
        ctx.feed.publish(ServerEvent::ReservationCreated {
            reservation_id: reservation.id,
        });

        self.reset();
        Ok(Submission {
            reservation,
            warnings,
        })
    }
}

fn required(value: &str, field: &'static str) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::MissingContact(field));
    }
    Ok(trimmed.to_string())
}
