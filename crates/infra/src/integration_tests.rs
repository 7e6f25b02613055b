//! Integration tests for the service layer over the in-memory store.
//!
//! Tests: HTTP-free service calls → store → read back
//!
//! Verifies:
//! - line totals and invoice totals stay consistent across every line mutation
//! - invoice numbers are sequential per month, including under concurrency
//! - status validation, cascade delete, and the user/credential flows

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use chrono::{DateTime, NaiveDate, TimeZone, Utc};

    use facturo_auth::{Argon2PasswordHasher, NewUser, UserChanges};
    use facturo_core::{Entity, FixedClock, InvoiceId, UserId};
    use facturo_invoicing::{
        Invoice, InvoiceChanges, InvoiceLineChanges, InvoiceNumber, InvoiceStatus, NewInvoice,
        NewInvoiceLine,
    };

    use crate::pdf::LopdfRenderer;
    use crate::services::{
        InvoiceAggregator, InvoiceLineService, InvoiceService, ServiceError, UserService,
    };
    use crate::store::{
        InMemoryStore, InvoiceLineStore, InvoiceStore, StoreError, StoreResult, UserStore,
    };

    fn june_19() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 19, 13, 1, 31).unwrap()
    }

    struct Harness {
        clock: Arc<FixedClock>,
        store: Arc<InMemoryStore>,
        invoices: Arc<InvoiceService>,
        lines: Arc<InvoiceLineService>,
        users: UserService,
    }

    fn setup() -> Harness {
        let store = Arc::new(InMemoryStore::new());
        setup_with(store.clone(), store)
    }

    fn setup_with(store: Arc<InMemoryStore>, invoice_store: Arc<dyn InvoiceStore>) -> Harness {
        let clock = Arc::new(FixedClock::new(june_19()));
        let line_store: Arc<dyn InvoiceLineStore> = store.clone();
        let user_store: Arc<dyn UserStore> = store.clone();

        let aggregator = Arc::new(InvoiceAggregator::new(
            invoice_store.clone(),
            line_store.clone(),
            clock.clone(),
        ));
        let invoices = Arc::new(InvoiceService::new(
            invoice_store.clone(),
            line_store.clone(),
            user_store.clone(),
            clock.clone(),
            aggregator.clone(),
            Arc::new(LopdfRenderer::new()),
        ));
        let lines = Arc::new(InvoiceLineService::new(
            invoice_store,
            line_store,
            clock.clone(),
            aggregator,
        ));
        let users = UserService::new(user_store, Arc::new(Argon2PasswordHasher::new()), clock.clone());

        Harness {
            clock,
            store,
            invoices,
            lines,
            users,
        }
    }

    fn named(name: &str) -> NewInvoice {
        NewInvoice {
            name: name.to_string(),
            ..Default::default()
        }
    }

    fn widget(quantity: f64, unit_price: f64) -> NewInvoiceLine {
        NewInvoiceLine {
            description: "Widget".to_string(),
            quantity,
            unit_price,
        }
    }

    async fn total_of(h: &Harness, id: InvoiceId) -> f64 {
        h.invoices.get_invoice(id).await.unwrap().total_amount()
    }

    #[tokio::test]
    async fn new_invoice_is_a_numbered_empty_draft() {
        let h = setup();
        let invoice = h.invoices.create_invoice(named("Test Invoice")).await.unwrap();

        assert_eq!(invoice.status(), InvoiceStatus::Brouillon);
        assert_eq!(invoice.total_amount(), 0.0);
        assert_eq!(invoice.invoice_number().as_str(), "FACT-202506001");
        assert_eq!(
            invoice.details().due_date,
            NaiveDate::from_ymd_opt(2025, 7, 19).unwrap()
        );
    }

    #[tokio::test]
    async fn line_lifecycle_keeps_totals_consistent() {
        let h = setup();
        let invoice = h.invoices.create_invoice(named("Test Invoice")).await.unwrap();
        let id = *invoice.id();

        let line = h.lines.create_line(id, widget(3.0, 10.0)).await.unwrap();
        assert_eq!(line.total(), 30.0);
        assert_eq!(total_of(&h, id).await, 30.0);

        let line = h
            .lines
            .update_line(
                *line.id(),
                InvoiceLineChanges {
                    quantity: Some(5.0),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(line.total(), 50.0);
        assert_eq!(total_of(&h, id).await, 50.0);

        h.lines.delete_line(*line.id()).await.unwrap();
        assert_eq!(total_of(&h, id).await, 0.0);
    }

    #[tokio::test]
    async fn bulk_create_aggregates_once() {
        let h = setup();
        let invoice = h.invoices.create_invoice(named("Bulk Invoice")).await.unwrap();
        let id = *invoice.id();

        let lines = h
            .lines
            .bulk_create_lines(id, vec![widget(2.0, 5.0), widget(1.0, 100.0)])
            .await
            .unwrap();

        let totals: Vec<f64> = lines.iter().map(|l| l.total()).collect();
        assert_eq!(totals, vec![10.0, 100.0]);
        assert_eq!(total_of(&h, id).await, 110.0);
    }

    #[tokio::test]
    async fn description_only_update_keeps_totals() {
        let h = setup();
        let id = *h.invoices.create_invoice(named("Test Invoice")).await.unwrap().id();
        let line = h.lines.create_line(id, widget(3.0, 10.0)).await.unwrap();

        let line = h
            .lines
            .update_line(
                *line.id(),
                InvoiceLineChanges {
                    description: Some("Gadget".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(line.description(), "Gadget");
        assert_eq!(line.total(), 30.0);
        assert_eq!(total_of(&h, id).await, 30.0);
    }

    #[tokio::test]
    async fn line_on_missing_invoice_is_not_found() {
        let h = setup();
        let err = h
            .lines
            .create_line(InvoiceId::new(), widget(1.0, 1.0))
            .await
            .unwrap_err();
        assert_eq!(err, ServiceError::NotFound("invoice"));
    }

    #[tokio::test]
    async fn numbers_are_sequential_within_a_month() {
        let h = setup();
        let mut numbers = Vec::new();
        for i in 0..5 {
            let invoice = h.invoices.create_invoice(named(&format!("Invoice {i}"))).await.unwrap();
            numbers.push(invoice.invoice_number().clone());
        }

        let sequences: Vec<u32> = numbers
            .iter()
            .map(|n| n.trailing_sequence().unwrap())
            .collect();
        assert_eq!(sequences, vec![1, 2, 3, 4, 5]);
        assert!(numbers.iter().all(|n| n.has_prefix("FACT-202506")));
    }

    #[tokio::test]
    async fn month_rollover_restarts_sequence() {
        let h = setup();
        h.invoices.create_invoice(named("June one")).await.unwrap();
        h.invoices.create_invoice(named("June two")).await.unwrap();

        h.clock.set(Utc.with_ymd_and_hms(2025, 7, 1, 8, 0, 0).unwrap());
        let july = h.invoices.create_invoice(named("July one")).await.unwrap();
        assert_eq!(july.invoice_number().as_str(), "FACT-202507001");
    }

    #[tokio::test]
    async fn sequence_grows_past_999() {
        let h = setup();
        let seeded = Invoice::draft(
            InvoiceNumber::from_stored("FACT-202506999"),
            named("Seeded"),
            june_19(),
        )
        .unwrap();
        h.store.insert_invoice(&seeded).await.unwrap();

        let next = h.invoices.create_invoice(named("Overflow")).await.unwrap();
        assert_eq!(next.invoice_number().as_str(), "FACT-2025061000");
    }

    #[tokio::test]
    async fn rejected_name_does_not_consume_a_number() {
        let h = setup();
        let err = h.invoices.create_invoice(named("ab")).await.unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));

        let ok = h.invoices.create_invoice(named("abc")).await.unwrap();
        assert_eq!(ok.invoice_number().as_str(), "FACT-202506001");
    }

    #[tokio::test]
    async fn concurrent_creations_get_distinct_numbers() {
        let h = setup();
        let mut tasks = Vec::new();
        for i in 0..20 {
            let invoices = h.invoices.clone();
            tasks.push(tokio::spawn(async move {
                invoices.create_invoice(named(&format!("Concurrent {i}"))).await
            }));
        }

        let mut numbers = Vec::new();
        for t in tasks {
            numbers.push(t.await.unwrap().unwrap().invoice_number().as_str().to_string());
        }
        numbers.sort();
        numbers.dedup();
        assert_eq!(numbers.len(), 20);
        assert_eq!(numbers.first().map(String::as_str), Some("FACT-202506001"));
        assert_eq!(numbers.last().map(String::as_str), Some("FACT-202506020"));
    }

    #[tokio::test]
    async fn concurrent_line_writes_settle_to_the_sum() {
        let h = setup();
        let id = *h.invoices.create_invoice(named("Busy Invoice")).await.unwrap().id();

        let mut tasks = Vec::new();
        for i in 1..=20 {
            let lines = h.lines.clone();
            tasks.push(tokio::spawn(async move {
                lines.create_line(id, widget(i as f64, 2.0)).await
            }));
        }
        for t in tasks {
            t.await.unwrap().unwrap();
        }

        let expected: f64 = (1..=20).map(|i| i as f64 * 2.0).sum();
        assert_eq!(total_of(&h, id).await, expected);
    }

    #[tokio::test]
    async fn status_accepts_enumeration_only() {
        let h = setup();
        let id = *h.invoices.create_invoice(named("Status Invoice")).await.unwrap().id();

        for label in ["ATTENTE", "PAYE", "RETARD", "ANNULE", "BROUILLON"] {
            let invoice = h.invoices.update_invoice_status(id, label).await.unwrap();
            assert_eq!(invoice.status().as_str(), label);
        }

        let err = h.invoices.update_invoice_status(id, "FOO").await.unwrap_err();
        assert_eq!(err, ServiceError::InvalidStatus("FOO".to_string()));
        assert_eq!(
            h.invoices.get_invoice(id).await.unwrap().status(),
            InvoiceStatus::Brouillon
        );
    }

    #[tokio::test]
    async fn invalid_status_wins_over_missing_invoice() {
        let h = setup();
        let err = h
            .invoices
            .update_invoice_status(InvoiceId::new(), "FOO")
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidStatus(_)));

        let err = h
            .invoices
            .update_invoice_status(InvoiceId::new(), "PAYE")
            .await
            .unwrap_err();
        assert_eq!(err, ServiceError::NotFound("invoice"));
    }

    #[tokio::test]
    async fn invoice_patch_cannot_touch_number_or_total() {
        let h = setup();
        let id = *h.invoices.create_invoice(named("Patch Invoice")).await.unwrap().id();
        h.lines.create_line(id, widget(3.0, 10.0)).await.unwrap();

        let updated = h
            .invoices
            .update_invoice(
                id,
                InvoiceChanges {
                    client_name: Some(Some("ACME".to_string())),
                    vat_active: Some(true),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.total_amount(), 30.0);
        assert_eq!(updated.invoice_number().as_str(), "FACT-202506001");
        assert!(updated.details().vat_active);
    }

    #[tokio::test]
    async fn invoice_patch_can_clear_optional_fields() {
        let h = setup();
        let user = h
            .users
            .register(NewUser {
                name: "Alice".into(),
                email: "alice@example.com".into(),
                password: "password123".into(),
            })
            .await
            .unwrap();
        let id = *h
            .invoices
            .create_invoice(NewInvoice {
                name: "Owned Invoice".into(),
                client_name: Some("ACME".into()),
                issuer_name: Some("Facturo SARL".into()),
                user_id: Some(*user.id()),
                ..Default::default()
            })
            .await
            .unwrap()
            .id();

        let updated = h
            .invoices
            .update_invoice(
                id,
                InvoiceChanges {
                    client_name: Some(None),
                    user_id: Some(None),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.details().client_name, None);
        assert_eq!(updated.user_id(), None);
        assert_eq!(updated.details().issuer_name.as_deref(), Some("Facturo SARL"));
    }

    #[tokio::test]
    async fn patch_with_status_writes_both() {
        let h = setup();
        let id = *h.invoices.create_invoice(named("Patch Invoice")).await.unwrap().id();

        let updated = h
            .invoices
            .update_invoice(
                id,
                InvoiceChanges {
                    name: Some("Renamed Invoice".into()),
                    status: Some(InvoiceStatus::Attente),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.name(), "Renamed Invoice");
        assert_eq!(updated.status(), InvoiceStatus::Attente);
        assert_eq!(h.invoices.get_invoice(id).await.unwrap(), updated);
    }

    #[tokio::test]
    async fn recompute_on_a_vanished_invoice_is_a_no_op() {
        let h = setup();
        let id = *h.invoices.create_invoice(named("Vanishing")).await.unwrap().id();
        h.lines.create_line(id, widget(3.0, 10.0)).await.unwrap();

        let aggregator = InvoiceAggregator::new(h.store.clone(), h.store.clone(), h.clock.clone());
        let guard = aggregator.lock(id).await;
        assert!(h.store.delete_invoice(id).await.unwrap());

        assert_eq!(aggregator.recompute(id, &guard).await, Ok(None));
        drop(guard);

        assert!(h.lines.list_lines(id).await.unwrap().is_empty());
        assert_eq!(
            h.invoices.get_invoice(id).await.unwrap_err(),
            ServiceError::NotFound("invoice")
        );
    }

    #[tokio::test]
    async fn recompute_on_a_live_invoice_returns_the_total() {
        let h = setup();
        let id = *h.invoices.create_invoice(named("Live")).await.unwrap().id();
        h.lines.create_line(id, widget(2.0, 4.0)).await.unwrap();

        let aggregator = InvoiceAggregator::new(h.store.clone(), h.store.clone(), h.clock.clone());
        let guard = aggregator.lock(id).await;
        assert_eq!(aggregator.recompute(id, &guard).await, Ok(Some(8.0)));
    }

    #[tokio::test]
    async fn deleting_an_invoice_removes_its_lines() {
        let h = setup();
        let id = *h.invoices.create_invoice(named("Doomed Invoice")).await.unwrap().id();
        let line = h.lines.create_line(id, widget(1.0, 1.0)).await.unwrap();

        h.invoices.delete_invoice(id).await.unwrap();

        assert_eq!(
            h.lines.get_line(*line.id()).await.unwrap_err(),
            ServiceError::NotFound("line")
        );
        assert_eq!(
            h.invoices.delete_invoice(id).await.unwrap_err(),
            ServiceError::NotFound("invoice")
        );
        assert!(h.lines.list_lines(id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn list_returns_summaries() {
        let h = setup();
        h.invoices.create_invoice(named("First")).await.unwrap();
        h.invoices.create_invoice(named("Second")).await.unwrap();

        let list = h.invoices.list_invoices().await.unwrap();
        let names: Vec<_> = list.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["First", "Second"]);
    }

    #[tokio::test]
    async fn details_include_lines_and_owner() {
        let h = setup();
        let user = h
            .users
            .register(NewUser {
                name: "Alice".into(),
                email: "alice@example.com".into(),
                password: "password123".into(),
            })
            .await
            .unwrap();

        let invoice = h
            .invoices
            .create_invoice(NewInvoice {
                name: "Owned Invoice".into(),
                user_id: Some(*user.id()),
                ..Default::default()
            })
            .await
            .unwrap();
        h.lines.create_line(*invoice.id(), widget(1.0, 5.0)).await.unwrap();
        h.lines.create_line(*invoice.id(), widget(2.0, 5.0)).await.unwrap();

        let details = h.invoices.get_invoice_with_lines(*invoice.id()).await.unwrap();
        assert_eq!(details.lines.len(), 2);
        assert_eq!(details.lines[0].total(), 5.0);
        assert_eq!(details.user.unwrap().email, "alice@example.com");
        assert_eq!(details.invoice.total_amount(), 15.0);

        let json = serde_json::to_value(
            h.invoices.get_invoice_with_lines(*invoice.id()).await.unwrap(),
        )
        .unwrap();
        assert_eq!(json["invoiceNumber"], "FACT-202506001");
        assert!(json["user"].get("passwordHash").is_none());
    }

    #[tokio::test]
    async fn unknown_owner_is_rejected() {
        let h = setup();
        let err = h
            .invoices
            .create_invoice(NewInvoice {
                name: "Orphan".into(),
                user_id: Some(UserId::new()),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert_eq!(err, ServiceError::NotFound("user"));
    }

    #[tokio::test]
    async fn pdf_export_produces_a_pdf() {
        let h = setup();
        let id = *h.invoices.create_invoice(named("Printable")).await.unwrap().id();
        h.lines.create_line(id, widget(3.0, 10.0)).await.unwrap();

        let bytes = h.invoices.render_pdf(id).await.unwrap();
        assert!(bytes.starts_with(b"%PDF-"));

        assert_eq!(
            h.invoices.render_pdf(InvoiceId::new()).await.unwrap_err(),
            ServiceError::NotFound("invoice")
        );
    }

    #[tokio::test]
    async fn user_registration_and_login() {
        let h = setup();
        let input = NewUser {
            name: "Alice".into(),
            email: "alice@example.com".into(),
            password: "password123".into(),
        };
        let user = h.users.register(input.clone()).await.unwrap();
        assert!(user.password_hash().starts_with("$argon2"));

        assert!(matches!(
            h.users.register(input).await.unwrap_err(),
            ServiceError::Conflict(_)
        ));

        let ok = h.users.authenticate("alice@example.com", "password123").await.unwrap();
        assert_eq!(ok.id(), user.id());

        let wrong = h.users.authenticate("alice@example.com", "nope").await.unwrap_err();
        let unknown = h.users.authenticate("bob@example.com", "password123").await.unwrap_err();
        assert_eq!(wrong, unknown);
        assert!(matches!(wrong, ServiceError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn profile_update_rechecks_email_and_rehashes_password() {
        let h = setup();
        let register = |name: &str, email: &str| NewUser {
            name: name.into(),
            email: email.into(),
            password: "password123".into(),
        };
        let alice = h.users.register(register("Alice", "alice@example.com")).await.unwrap();
        h.users.register(register("Bob", "bob@example.com")).await.unwrap();

        let err = h
            .users
            .update_user(
                *alice.id(),
                UserChanges {
                    email: Some("bob@example.com".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));

        // Same email is not a conflict with itself.
        h.users
            .update_user(
                *alice.id(),
                UserChanges {
                    email: Some("alice@example.com".into()),
                    password: Some("new-secret".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert!(h.users.authenticate("alice@example.com", "password123").await.is_err());
        assert!(h.users.authenticate("alice@example.com", "new-secret").await.is_ok());
    }

    /// Delegates to the in-memory store but reports the first `failures`
    /// inserts as number collisions, like a second process winning the race.
    struct CollidingInvoiceStore {
        inner: Arc<InMemoryStore>,
        failures: AtomicU32,
    }

    #[async_trait]
    impl InvoiceStore for CollidingInvoiceStore {
        async fn insert_invoice(&self, invoice: &Invoice) -> StoreResult<()> {
            let remaining = self.failures.load(Ordering::SeqCst);
            if remaining > 0 {
                self.failures.store(remaining - 1, Ordering::SeqCst);
                return Err(StoreError::Conflict("invoice_number".to_string()));
            }
            self.inner.insert_invoice(invoice).await
        }

        async fn update_invoice_details(&self, invoice: &Invoice) -> StoreResult<()> {
            self.inner.update_invoice_details(invoice).await
        }

        async fn set_invoice_status(
            &self,
            id: InvoiceId,
            status: InvoiceStatus,
            updated_at: DateTime<Utc>,
        ) -> StoreResult<()> {
            self.inner.set_invoice_status(id, status, updated_at).await
        }

        async fn set_invoice_total(
            &self,
            id: InvoiceId,
            total: f64,
            updated_at: DateTime<Utc>,
        ) -> StoreResult<()> {
            self.inner.set_invoice_total(id, total, updated_at).await
        }

        async fn get_invoice(&self, id: InvoiceId) -> StoreResult<Option<Invoice>> {
            self.inner.get_invoice(id).await
        }

        async fn list_invoices(&self) -> StoreResult<Vec<Invoice>> {
            self.inner.list_invoices().await
        }

        async fn delete_invoice(&self, id: InvoiceId) -> StoreResult<bool> {
            self.inner.delete_invoice(id).await
        }

        async fn latest_invoice_number(&self, prefix: &str) -> StoreResult<Option<InvoiceNumber>> {
            self.inner.latest_invoice_number(prefix).await
        }
    }

    fn colliding(failures: u32) -> Harness {
        let store = Arc::new(InMemoryStore::new());
        let invoice_store = Arc::new(CollidingInvoiceStore {
            inner: store.clone(),
            failures: AtomicU32::new(failures),
        });
        setup_with(store, invoice_store)
    }

    #[tokio::test]
    async fn number_collision_is_retried() {
        let h = colliding(2);
        let invoice = h.invoices.create_invoice(named("Retried")).await.unwrap();
        assert_eq!(invoice.invoice_number().as_str(), "FACT-202506001");
    }

    #[tokio::test]
    async fn persistent_collision_gives_up() {
        let h = colliding(crate::services::MAX_NUMBERING_ATTEMPTS);
        let err = h.invoices.create_invoice(named("Unlucky")).await.unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));
    }

    /// Delegates to the in-memory store but stalls before every invoice write,
    /// widening the window in which another process can interleave.
    struct SlowInvoiceStore {
        inner: Arc<InMemoryStore>,
        delay: Duration,
    }

    #[async_trait]
    impl InvoiceStore for SlowInvoiceStore {
        async fn insert_invoice(&self, invoice: &Invoice) -> StoreResult<()> {
            self.inner.insert_invoice(invoice).await
        }

        async fn update_invoice_details(&self, invoice: &Invoice) -> StoreResult<()> {
            tokio::time::sleep(self.delay).await;
            self.inner.update_invoice_details(invoice).await
        }

        async fn set_invoice_status(
            &self,
            id: InvoiceId,
            status: InvoiceStatus,
            updated_at: DateTime<Utc>,
        ) -> StoreResult<()> {
            tokio::time::sleep(self.delay).await;
            self.inner.set_invoice_status(id, status, updated_at).await
        }

        async fn set_invoice_total(
            &self,
            id: InvoiceId,
            total: f64,
            updated_at: DateTime<Utc>,
        ) -> StoreResult<()> {
            tokio::time::sleep(self.delay).await;
            self.inner.set_invoice_total(id, total, updated_at).await
        }

        async fn get_invoice(&self, id: InvoiceId) -> StoreResult<Option<Invoice>> {
            self.inner.get_invoice(id).await
        }

        async fn list_invoices(&self) -> StoreResult<Vec<Invoice>> {
            self.inner.list_invoices().await
        }

        async fn delete_invoice(&self, id: InvoiceId) -> StoreResult<bool> {
            self.inner.delete_invoice(id).await
        }

        async fn latest_invoice_number(&self, prefix: &str) -> StoreResult<Option<InvoiceNumber>> {
            self.inner.latest_invoice_number(prefix).await
        }
    }

    /// Two service stacks over one store, each with its own per-invoice locks,
    /// like two API processes sharing a database. The first one writes slowly.
    fn two_processes() -> (Harness, Harness) {
        let store = Arc::new(InMemoryStore::new());
        let slow = Arc::new(SlowInvoiceStore {
            inner: store.clone(),
            delay: Duration::from_millis(100),
        });
        let a = setup_with(store.clone(), slow);
        let b = setup_with(store.clone(), store);
        (a, b)
    }

    async fn after_a_moment<F: std::future::Future>(f: F) -> F::Output {
        tokio::time::sleep(Duration::from_millis(20)).await;
        f.await
    }

    #[tokio::test]
    async fn status_change_keeps_a_concurrent_total() {
        let (a, b) = two_processes();
        let id = *b.invoices.create_invoice(named("Shared Invoice")).await.unwrap().id();

        let (status, line) = tokio::join!(
            a.invoices.update_invoice_status(id, "PAYE"),
            after_a_moment(b.lines.create_line(id, widget(3.0, 10.0))),
        );
        status.unwrap();
        line.unwrap();

        let invoice = b.invoices.get_invoice(id).await.unwrap();
        assert_eq!(invoice.total_amount(), 30.0);
        assert_eq!(invoice.status(), InvoiceStatus::Paye);
    }

    #[tokio::test]
    async fn recompute_keeps_a_concurrent_status() {
        let (a, b) = two_processes();
        let id = *b.invoices.create_invoice(named("Shared Invoice")).await.unwrap().id();

        let (line, status) = tokio::join!(
            a.lines.create_line(id, widget(3.0, 10.0)),
            after_a_moment(b.invoices.update_invoice_status(id, "PAYE")),
        );
        line.unwrap();
        status.unwrap();

        let invoice = b.invoices.get_invoice(id).await.unwrap();
        assert_eq!(invoice.total_amount(), 30.0);
        assert_eq!(invoice.status(), InvoiceStatus::Paye);
    }

    #[tokio::test]
    async fn patch_keeps_a_concurrent_total() {
        let (a, b) = two_processes();
        let id = *b.invoices.create_invoice(named("Shared Invoice")).await.unwrap().id();

        let (patched, line) = tokio::join!(
            a.invoices.update_invoice(
                id,
                InvoiceChanges {
                    client_name: Some(Some("ACME".to_string())),
                    ..Default::default()
                },
            ),
            after_a_moment(b.lines.create_line(id, widget(3.0, 10.0))),
        );
        line.unwrap();
        let patched = patched.unwrap();
        assert_eq!(patched.total_amount(), 30.0);

        let invoice = b.invoices.get_invoice(id).await.unwrap();
        assert_eq!(invoice.total_amount(), 30.0);
        assert_eq!(invoice.details().client_name.as_deref(), Some("ACME"));
    }
}
