use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use facturo_auth::User;
use facturo_core::{Entity, InvoiceId, InvoiceLineId, UserId};
use facturo_invoicing::{Invoice, InvoiceLine, InvoiceNumber, InvoiceStatus};

use super::{InvoiceLineStore, InvoiceStore, StoreError, StoreResult, UserStore};

/// Record plus its insertion position, used to order rows sharing a timestamp.
#[derive(Debug, Clone)]
struct Row<T> {
    seq: u64,
    value: T,
}

#[derive(Debug, Default)]
struct Tables {
    next_seq: u64,
    invoices: HashMap<InvoiceId, Row<Invoice>>,
    lines: HashMap<InvoiceLineId, Row<InvoiceLine>>,
    users: HashMap<UserId, Row<User>>,
}

impl Tables {
    fn seq(&mut self) -> u64 {
        self.next_seq += 1;
        self.next_seq
    }

    fn email_taken(&self, email: &str, except: Option<UserId>) -> bool {
        self.users
            .values()
            .any(|row| row.value.email() == email && Some(*row.value.id()) != except)
    }

    fn check_user_ref(&self, user_id: Option<UserId>) -> StoreResult<()> {
        match user_id {
            Some(id) if !self.users.contains_key(&id) => Err(StoreError::NotFound("user")),
            _ => Ok(()),
        }
    }
}

/// In-memory implementation of every store trait.
///
/// Intended for tests/dev. Enforces the same uniqueness and referential rules
/// as the Postgres schema.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, Tables>> {
        self.tables
            .read()
            .map_err(|_| StoreError::Backend("in-memory store lock poisoned".to_string()))
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, Tables>> {
        self.tables
            .write()
            .map_err(|_| StoreError::Backend("in-memory store lock poisoned".to_string()))
    }
}

fn sorted<T: Clone>(mut rows: Vec<&Row<T>>, created_at: impl Fn(&T) -> DateTime<Utc>) -> Vec<T> {
    rows.sort_by(|a, b| {
        created_at(&a.value)
            .cmp(&created_at(&b.value))
            .then(a.seq.cmp(&b.seq))
    });
    rows.into_iter().map(|r| r.value.clone()).collect()
}

#[async_trait]
impl InvoiceStore for InMemoryStore {
    async fn insert_invoice(&self, invoice: &Invoice) -> StoreResult<()> {
        let mut t = self.write()?;
        if t.invoices.contains_key(invoice.id()) {
            return Err(StoreError::Conflict(format!("invoice {} already exists", invoice.id())));
        }
        if t
            .invoices
            .values()
            .any(|row| row.value.invoice_number() == invoice.invoice_number())
        {
            return Err(StoreError::Conflict(format!(
                "invoice number {} already exists",
                invoice.invoice_number()
            )));
        }
        t.check_user_ref(invoice.user_id())?;

        let seq = t.seq();
        t.invoices.insert(
            *invoice.id(),
            Row {
                seq,
                value: invoice.clone(),
            },
        );
        Ok(())
    }

    async fn update_invoice_details(&self, invoice: &Invoice) -> StoreResult<()> {
        let mut t = self.write()?;
        t.check_user_ref(invoice.user_id())?;
        let row = t
            .invoices
            .get_mut(invoice.id())
            .ok_or(StoreError::NotFound("invoice"))?;
        let stored = &row.value;
        row.value = Invoice::restore(
            *stored.id(),
            stored.invoice_number().clone(),
            stored.status(),
            stored.total_amount(),
            invoice.details().clone(),
            stored.created_at(),
            invoice.updated_at(),
        );
        Ok(())
    }

    async fn set_invoice_status(
        &self,
        id: InvoiceId,
        status: InvoiceStatus,
        updated_at: DateTime<Utc>,
    ) -> StoreResult<()> {
        let mut t = self.write()?;
        let row = t.invoices.get_mut(&id).ok_or(StoreError::NotFound("invoice"))?;
        row.value.set_status(status, updated_at);
        Ok(())
    }

    async fn set_invoice_total(
        &self,
        id: InvoiceId,
        total: f64,
        updated_at: DateTime<Utc>,
    ) -> StoreResult<()> {
        let mut t = self.write()?;
        let row = t.invoices.get_mut(&id).ok_or(StoreError::NotFound("invoice"))?;
        row.value.set_total_amount(total, updated_at);
        Ok(())
    }

    async fn get_invoice(&self, id: InvoiceId) -> StoreResult<Option<Invoice>> {
        Ok(self.read()?.invoices.get(&id).map(|row| row.value.clone()))
    }

    async fn list_invoices(&self) -> StoreResult<Vec<Invoice>> {
        let t = self.read()?;
        Ok(sorted(t.invoices.values().collect(), |i: &Invoice| i.created_at()))
    }

    async fn delete_invoice(&self, id: InvoiceId) -> StoreResult<bool> {
        let mut t = self.write()?;
        if t.invoices.remove(&id).is_none() {
            return Ok(false);
        }
        t.lines.retain(|_, row| row.value.invoice_id() != id);
        Ok(true)
    }

    async fn latest_invoice_number(&self, prefix: &str) -> StoreResult<Option<InvoiceNumber>> {
        let t = self.read()?;
        Ok(t.invoices
            .values()
            .filter(|row| row.value.invoice_number().has_prefix(prefix))
            .max_by(|a, b| {
                a.value
                    .created_at()
                    .cmp(&b.value.created_at())
                    .then(a.seq.cmp(&b.seq))
            })
            .map(|row| row.value.invoice_number().clone()))
    }
}

#[async_trait]
impl InvoiceLineStore for InMemoryStore {
    async fn insert_line(&self, line: &InvoiceLine) -> StoreResult<()> {
        self.insert_lines(std::slice::from_ref(line)).await
    }

    async fn insert_lines(&self, lines: &[InvoiceLine]) -> StoreResult<()> {
        let mut t = self.write()?;
        for line in lines {
            if !t.invoices.contains_key(&line.invoice_id()) {
                return Err(StoreError::NotFound("invoice"));
            }
            if t.lines.contains_key(line.id()) {
                return Err(StoreError::Conflict(format!("line {} already exists", line.id())));
            }
        }
        for line in lines {
            let seq = t.seq();
            t.lines.insert(
                *line.id(),
                Row {
                    seq,
                    value: line.clone(),
                },
            );
        }
        Ok(())
    }

    async fn update_line(&self, line: &InvoiceLine) -> StoreResult<()> {
        let mut t = self.write()?;
        let row = t.lines.get_mut(line.id()).ok_or(StoreError::NotFound("line"))?;
        row.value = line.clone();
        Ok(())
    }

    async fn get_line(&self, id: InvoiceLineId) -> StoreResult<Option<InvoiceLine>> {
        Ok(self.read()?.lines.get(&id).map(|row| row.value.clone()))
    }

    async fn lines_for_invoice(&self, invoice_id: InvoiceId) -> StoreResult<Vec<InvoiceLine>> {
        let t = self.read()?;
        let rows = t
            .lines
            .values()
            .filter(|row| row.value.invoice_id() == invoice_id)
            .collect();
        Ok(sorted(rows, |l: &InvoiceLine| l.created_at()))
    }

    async fn delete_line(&self, id: InvoiceLineId) -> StoreResult<bool> {
        Ok(self.write()?.lines.remove(&id).is_some())
    }
}

#[async_trait]
impl UserStore for InMemoryStore {
    async fn insert_user(&self, user: &User) -> StoreResult<()> {
        let mut t = self.write()?;
        if t.email_taken(user.email(), None) {
            return Err(StoreError::Conflict(format!("email {} already registered", user.email())));
        }
        let seq = t.seq();
        t.users.insert(
            *user.id(),
            Row {
                seq,
                value: user.clone(),
            },
        );
        Ok(())
    }

    async fn update_user(&self, user: &User) -> StoreResult<()> {
        let mut t = self.write()?;
        if t.email_taken(user.email(), Some(*user.id())) {
            return Err(StoreError::Conflict(format!("email {} already registered", user.email())));
        }
        let row = t.users.get_mut(user.id()).ok_or(StoreError::NotFound("user"))?;
        row.value = user.clone();
        Ok(())
    }

    async fn get_user(&self, id: UserId) -> StoreResult<Option<User>> {
        Ok(self.read()?.users.get(&id).map(|row| row.value.clone()))
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        Ok(self
            .read()?
            .users
            .values()
            .find(|row| row.value.email() == email)
            .map(|row| row.value.clone()))
    }
}
