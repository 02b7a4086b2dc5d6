use ulid::Ulid;

use crate::model::*;

use super::Ledger;

impl Ledger {
    /// Tables ordered by label.
    pub async fn list_resources(&self) -> Vec<Resource> {
        let books: Vec<_> = self.books.iter().map(|e| e.value().clone()).collect();
        let mut resources = Vec::with_capacity(books.len());
        for book in books {
            resources.push(book.read().await.resource.clone());
        }
        resources.sort_by(|a, b| a.label.cmp(&b.label).then(a.id.cmp(&b.id)));
        resources
    }

    /// Every booking, grouped by table (in table id order) and sorted by
    /// day and start slot within a table.
    pub async fn list_bookings(&self) -> Vec<Booking> {
        let mut books: Vec<_> = self
            .books
            .iter()
            .map(|e| (*e.key(), e.value().clone()))
            .collect();
        books.sort_by_key(|(id, _)| *id);

        let mut bookings = Vec::new();
        for (_, book) in books {
            bookings.extend_from_slice(book.read().await.bookings());
        }
        bookings
    }

    pub async fn get_booking(&self, id: Ulid) -> Option<Booking> {
        let resource_id = self.resource_for_booking(&id)?;
        let book = self.get_book(&resource_id)?;
        let guard = book.read().await;
        guard.get(id).cloned()
    }

    /// One table's bookings on one day, in start order.
    pub async fn bookings_on(&self, resource_id: Ulid, day: &str) -> Vec<Booking> {
        match self.get_book(&resource_id) {
            Some(book) => book.read().await.on_day(day).to_vec(),
            None => Vec::new(),
        }
    }
}
