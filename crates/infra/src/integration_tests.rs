//! Full pipeline: service → dispatcher → event store → bus → projections.

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicI64, AtomicU32, Ordering};
    use std::thread;
    use std::time::{Duration, Instant};

    use chrono::{DateTime, TimeZone, Utc};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use serde_json::Value as JsonValue;

    use oficina_auth::{CreateUser, Role, User, UserCommand};
    use oficina_core::{AggregateId, ExpectedVersion, UserId, WorkOrderId};
    use oficina_events::{EventEnvelope, InMemoryEventBus};
    use oficina_inventory::{Actor, MovementKind, PartId};
    use oficina_workorders::{ClientId, MechanicId, OpenWorkOrder, VehicleId, WorkOrder, WorkOrderCommand};

    use crate::aggregate_types;
    use crate::command_dispatcher::{CommandDispatcher, DispatchError};
    use crate::event_store::{EventStore, EventStoreError, InMemoryEventStore, StoredEvent, UncommittedEvent};
    use crate::projections::ReadModels;
    use crate::stock_service::{EntryRequest, ExitRequest, NewPart, PartChanges, StockMovementService};
    use oficina_inventory::{Category, CategoryCommand, CategoryId, CreateCategory};
    use crate::workers::{ProjectionWorker, WorkerHandle};

    type Store = Arc<InMemoryEventStore>;
    type Bus = Arc<InMemoryEventBus<EventEnvelope<JsonValue>>>;

    struct Harness {
        dispatcher: Arc<CommandDispatcher<Store, Bus>>,
        read_models: ReadModels,
        service: StockMovementService<Store, Bus>,
        worker: Option<WorkerHandle>,
    }

    impl Drop for Harness {
        fn drop(&mut self) {
            if let Some(worker) = self.worker.take() {
                worker.shutdown();
            }
        }
    }

    fn setup() -> Harness {
        let store: Store = Arc::new(InMemoryEventStore::new());
        let bus: Bus = Arc::new(InMemoryEventBus::new());
        let dispatcher = Arc::new(CommandDispatcher::new(store, bus.clone()));
        let read_models = ReadModels::in_memory();

        let projections = read_models.clone();
        let worker = ProjectionWorker::spawn("test.projections", &bus, move |env: EventEnvelope<JsonValue>| {
            projections.apply_envelope(&env)
        })
        .unwrap();

        let service = StockMovementService::new(
            dispatcher.clone(),
            read_models.parts.clone(),
            read_models.users.clone(),
        );

        Harness {
            dispatcher,
            read_models,
            service,
            worker: Some(worker),
        }
    }

    fn wait_until(mut condition: impl FnMut() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(2);
        while Instant::now() < deadline {
            if condition() {
                return;
            }
            thread::sleep(Duration::from_millis(10));
        }
        panic!("condition not met within 2s");
    }

    fn new_part(number: &str, quantity: i64, min_stock: i64) -> NewPart {
        NewPart {
            name: "Pastilha de freio".to_string(),
            part_number: number.to_string(),
            description: None,
            category_id: None,
            cost_price: dec!(45),
            sale_price: dec!(89.90),
            initial_quantity: quantity,
            min_stock,
            location: Some("Prateleira B2".to_string()),
        }
    }

    fn exit(part_id: PartId, quantity: i64) -> ExitRequest {
        ExitRequest {
            part_id,
            quantity,
            reason: "Aplicada na OS de revisão".to_string(),
            work_order_id: None,
            actor: None,
        }
    }

    fn entry(part_id: PartId, quantity: i64, reason: &str) -> EntryRequest {
        EntryRequest {
            part_id,
            quantity,
            reason: reason.to_string(),
            cost_price: None,
            sale_price: None,
            work_order_id: None,
            actor: None,
        }
    }

    #[test]
    fn exit_to_threshold_alerts_and_over_exit_is_rejected() {
        let h = setup();
        let part = h.service.register_part(new_part("PF-10", 10, 5)).unwrap();

        let rejected = h.service.record_exit(exit(part.id, 11)).unwrap_err();
        assert!(matches!(rejected, DispatchError::Validation(_)));
        assert_eq!(h.service.get_part(part.id).unwrap().quantity, 10);

        let outcome = h.service.record_exit(exit(part.id, 6)).unwrap();
        assert_eq!(outcome.quantity, 4);
        assert_eq!(outcome.movement.quantity_before, 10);
        assert_eq!(outcome.movement.delta, -6);
        let alert = outcome.alert.unwrap();
        assert_eq!(alert.quantity, 4);
        assert_eq!(alert.threshold, 5);
    }

    #[test]
    fn entry_from_zero_records_one_movement() {
        let h = setup();
        let part = h.service.register_part(new_part("FO-1", 0, 2)).unwrap();

        let outcome = h.service.record_entry(entry(part.id, 5, "Compra do fornecedor X")).unwrap();
        assert_eq!(outcome.movement.kind, MovementKind::Entry);
        assert_eq!((outcome.movement.quantity_before, outcome.movement.quantity_after), (0, 5));
        assert!(outcome.alert.is_none());

        let history = h.service.history(part.id).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].actor, Actor::System);
    }

    #[test]
    fn reason_needs_ten_characters() {
        let h = setup();
        let part = h.service.register_part(new_part("VL-3", 20, 2)).unwrap();

        assert!(matches!(
            h.service.record_entry(entry(part.id, 1, "123456789")),
            Err(DispatchError::Validation(_))
        ));
        let mut short_exit = exit(part.id, 1);
        short_exit.reason = "123456789".to_string();
        assert!(matches!(h.service.record_exit(short_exit), Err(DispatchError::Validation(_))));

        assert!(h.service.record_entry(entry(part.id, 1, "1234567890")).is_ok());
        let mut exact_exit = exit(part.id, 1);
        exact_exit.reason = "1234567890".to_string();
        assert!(h.service.record_exit(exact_exit).is_ok());
    }

    #[test]
    fn entry_updates_prices_when_supplied() {
        let h = setup();
        let part = h.service.register_part(new_part("AM-1", 2, 1)).unwrap();

        let mut request = entry(part.id, 3, "Reposição com reajuste");
        request.cost_price = Some(dec!(50));
        request.sale_price = Some(dec!(99.90));
        h.service.record_entry(request).unwrap();

        let current = h.service.get_part(part.id).unwrap();
        assert_eq!(current.cost_price, dec!(50));
        assert_eq!(current.sale_price, dec!(99.90));

        let mut bad = entry(part.id, 1, "Reposição com preço zerado");
        bad.cost_price = Some(Decimal::ZERO);
        assert!(matches!(h.service.record_entry(bad), Err(DispatchError::Validation(_))));
    }

    #[test]
    fn unknown_part_and_unknown_work_order_are_not_found() {
        let h = setup();
        let missing = PartId::new(AggregateId::new());

        assert!(matches!(h.service.record_entry(entry(missing, 1, "Compra avulsa balcão")), Err(DispatchError::NotFound(_))));
        assert!(matches!(h.service.record_exit(exit(missing, 1)), Err(DispatchError::NotFound(_))));
        assert!(matches!(h.service.history(missing), Err(DispatchError::NotFound(_))));

        let part = h.service.register_part(new_part("CR-9", 5, 1)).unwrap();
        let mut with_os = exit(part.id, 1);
        with_os.work_order_id = Some(WorkOrderId::new());
        assert!(matches!(h.service.record_exit(with_os), Err(DispatchError::NotFound(_))));
        assert_eq!(h.service.get_part(part.id).unwrap().quantity, 5);
    }

    #[test]
    fn exit_can_reference_an_open_work_order() {
        let h = setup();
        let part = h.service.register_part(new_part("OL-5", 8, 1)).unwrap();

        let work_order_id = WorkOrderId::new();
        h.dispatcher
            .dispatch::<WorkOrder>(
                work_order_id.into(),
                aggregate_types::WORK_ORDER,
                WorkOrderCommand::OpenWorkOrder(OpenWorkOrder {
                    work_order_id,
                    client_id: ClientId::new(AggregateId::new()),
                    vehicle_id: VehicleId::new(AggregateId::new()),
                    mechanic_id: MechanicId::new(AggregateId::new()),
                    status: None,
                    problem_description: Some("Troca de óleo".to_string()),
                    notes: None,
                    payment_method: None,
                    discount: Decimal::ZERO,
                    services: vec![],
                    parts: vec![],
                    occurred_at: Utc::now(),
                }),
                |_| WorkOrder::empty(work_order_id),
            )
            .unwrap();

        let mut request = exit(part.id, 4);
        request.work_order_id = Some(work_order_id);
        let outcome = h.service.record_exit(request).unwrap();
        assert_eq!(outcome.movement.work_order_id, Some(work_order_id));
    }

    #[test]
    fn history_is_newest_first_with_ledger_order_on_ties() {
        let fixed = Utc.with_ymd_and_hms(2024, 5, 10, 14, 30, 0).unwrap();
        let mut h = setup();
        h.service = StockMovementService::new(
            h.dispatcher.clone(),
            h.read_models.parts.clone(),
            h.read_models.users.clone(),
        )
        .with_clock(Arc::new(move || fixed));

        let user_id = UserId::new();
        h.dispatcher
            .dispatch::<User>(
                user_id.into(),
                aggregate_types::USER,
                UserCommand::Create(CreateUser {
                    user_id,
                    email: "carlos@oficina.com".to_string(),
                    display_name: "Carlos".to_string(),
                    role: Role::mechanic(),
                    password_hash: "$argon2id$placeholder".to_string(),
                    must_change_password: false,
                    occurred_at: Utc::now(),
                }),
                |_| User::empty(user_id),
            )
            .unwrap();
        wait_until(|| h.read_models.users.get(&user_id).is_some());

        let part = h.service.register_part(new_part("TM-2", 10, 1)).unwrap();
        let mut first = entry(part.id, 2, "Compra do fornecedor Y");
        first.actor = Some(user_id);
        h.service.record_entry(first).unwrap();
        h.service.record_exit(exit(part.id, 3)).unwrap();
        let mut unknown_actor = exit(part.id, 1);
        unknown_actor.actor = Some(UserId::new());
        h.service.record_exit(unknown_actor).unwrap();

        let history = h.service.history(part.id).unwrap();
        let positions: Vec<u64> = history.iter().map(|e| e.movement.position).collect();
        assert_eq!(positions, vec![1, 2, 3]);
        assert_eq!(history[0].actor.display_name(), "Carlos");
        assert_eq!(history[1].actor, Actor::System);
        assert_eq!(history[2].actor, Actor::System);
    }

    #[test]
    fn concurrent_exits_keep_the_ledger_chained() {
        let h = setup();
        let part = h.service.register_part(new_part("CC-1", 40, 0)).unwrap();
        let service = Arc::new(
            StockMovementService::new(h.dispatcher.clone(), h.read_models.parts.clone(), h.read_models.users.clone())
                .with_max_attempts(64),
        );

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let service = service.clone();
                let part_id = part.id;
                thread::spawn(move || service.record_exit(exit(part_id, 3)))
            })
            .collect();
        for handle in handles {
            handle.join().unwrap().unwrap();
        }

        assert_eq!(service.get_part(part.id).unwrap().quantity, 40 - 8 * 3);

        let mut movements: Vec<_> = service.history(part.id).unwrap().into_iter().map(|e| e.movement).collect();
        movements.sort_by_key(|m| m.position);
        let mut expected_before = 40;
        for m in &movements {
            assert_eq!(m.quantity_before, expected_before);
            assert!(m.is_consistent());
            expected_before = m.quantity_after;
        }
    }

    #[test]
    fn part_numbers_are_unique_and_direct_edits_stop_after_movements() {
        let h = setup();
        let part = h.service.register_part(new_part("UN-1", 3, 1)).unwrap();
        wait_until(|| h.read_models.parts.get(&part.id).is_some());

        assert!(matches!(
            h.service.register_part(new_part(" un-1 ", 1, 1)),
            Err(DispatchError::Conflict(_))
        ));

        let changes = |quantity: Option<i64>| PartChanges {
            name: "Pastilha dianteira".to_string(),
            part_number: "UN-1".to_string(),
            description: Some("Jogo com 4".to_string()),
            category_id: None,
            cost_price: dec!(45),
            sale_price: dec!(95),
            min_stock: 2,
            location: None,
            quantity,
        };

        let updated = h.service.update_part(part.id, changes(Some(7))).unwrap();
        assert_eq!(updated.quantity, 7);
        assert_eq!(updated.name, "Pastilha dianteira");

        h.service.record_exit(exit(part.id, 1)).unwrap();
        assert!(matches!(
            h.service.update_part(part.id, changes(Some(9))),
            Err(DispatchError::InvariantViolation(_))
        ));
        assert!(h.service.update_part(part.id, changes(None)).is_ok());
    }

    #[test]
    fn catalog_follows_the_streams_and_rebuilds_identically() {
        let h = setup();
        let part = h.service.register_part(new_part("RB-1", 10, 5)).unwrap();
        h.service.record_exit(exit(part.id, 6)).unwrap();
        h.service.record_entry(entry(part.id, 1, "Devolução de cliente")).unwrap();

        wait_until(|| h.read_models.parts.get(&part.id).map(|p| p.quantity) == Some(5));
        let live = h.read_models.parts.get(&part.id).unwrap();
        assert_eq!(live.movement_count, 2);
        assert_eq!(h.read_models.parts.low_stock().len(), 1);

        let replay: Vec<_> = h
            .dispatcher
            .store()
            .load_all()
            .unwrap()
            .iter()
            .map(|e| e.to_envelope())
            .collect();
        let rebuilt = ReadModels::in_memory();
        rebuilt.rebuild_from_scratch(replay).unwrap();
        assert_eq!(rebuilt.parts.get(&part.id), Some(live));
    }

    #[test]
    fn ids_of_other_aggregates_are_not_parts() {
        let h = setup();
        let category_id = CategoryId::new(AggregateId::new());
        h.dispatcher
            .dispatch::<Category>(
                category_id.0,
                aggregate_types::CATEGORY,
                CategoryCommand::CreateCategory(CreateCategory {
                    category_id,
                    name: "Filtros".to_string(),
                    description: None,
                    occurred_at: Utc::now(),
                }),
                |_| Category::empty(category_id),
            )
            .unwrap();
        let not_a_part = PartId::new(category_id.0);

        for err in [
            h.service.history(not_a_part).unwrap_err(),
            h.service.get_part(not_a_part).unwrap_err(),
            h.service.record_exit(exit(not_a_part, 1)).unwrap_err(),
            h.service.delete_part(not_a_part).unwrap_err(),
        ] {
            assert!(matches!(&err, DispatchError::NotFound(msg) if msg == "peça não encontrada"), "{err:?}");
        }

        let part = h.service.register_part(new_part("NP-1", 5, 1)).unwrap();
        let mut with_part_as_os = exit(part.id, 1);
        with_part_as_os.work_order_id = Some(WorkOrderId::from_uuid(*part.id.0.as_uuid()));
        assert!(matches!(h.service.record_exit(with_part_as_os), Err(DispatchError::NotFound(_))));
        assert_eq!(h.dispatcher.store().load_stream(category_id.0).unwrap().len(), 1);
    }

    #[test]
    fn unused_part_is_deleted_and_leaves_the_catalog() {
        let h = setup();
        let part = h.service.register_part(new_part("DL-1", 4, 1)).unwrap();
        wait_until(|| h.read_models.parts.get(&part.id).is_some());

        h.service.delete_part(part.id).unwrap();

        assert!(matches!(h.service.get_part(part.id), Err(DispatchError::NotFound(_))));
        assert!(matches!(h.service.history(part.id), Err(DispatchError::NotFound(_))));
        assert!(matches!(h.service.record_entry(entry(part.id, 1, "Compra do fornecedor X")), Err(DispatchError::NotFound(_))));
        assert!(matches!(h.service.delete_part(part.id), Err(DispatchError::NotFound(_))));
        wait_until(|| h.read_models.parts.get(&part.id).is_none());
        assert!(h.service.register_part(new_part("DL-1", 0, 0)).is_ok());
    }

    #[test]
    fn part_with_movements_is_not_deleted() {
        let h = setup();
        let part = h.service.register_part(new_part("DL-2", 4, 1)).unwrap();
        h.service.record_exit(exit(part.id, 1)).unwrap();

        assert!(matches!(h.service.delete_part(part.id), Err(DispatchError::InvariantViolation(_))));
        assert_eq!(h.service.get_part(part.id).unwrap().quantity, 3);
        assert_eq!(h.service.history(part.id).unwrap().len(), 1);
    }

    #[test]
    fn entry_past_the_quantity_limit_is_rejected() {
        let h = setup();
        let part = h.service.register_part(new_part("LM-1", 1, 0)).unwrap();

        let err = h.service.record_entry(entry(part.id, i64::MAX, "Compra do fornecedor X")).unwrap_err();
        assert!(matches!(err, DispatchError::Validation(_)));
        assert_eq!(h.service.get_part(part.id).unwrap().quantity, 1);
        assert!(h.service.history(part.id).unwrap().is_empty());
    }

    /// Fails the next `stale_appends` appends as if another writer got there first.
    struct StaleOnce {
        inner: InMemoryEventStore,
        stale_appends: AtomicU32,
    }

    impl EventStore for StaleOnce {
        fn append(
            &self,
            events: Vec<UncommittedEvent>,
            expected_version: ExpectedVersion,
        ) -> Result<Vec<StoredEvent>, EventStoreError> {
            let stale = self
                .stale_appends
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if stale {
                return Err(EventStoreError::Concurrency("stream moved".to_string()));
            }
            self.inner.append(events, expected_version)
        }

        fn load_stream(&self, aggregate_id: AggregateId) -> Result<Vec<StoredEvent>, EventStoreError> {
            self.inner.load_stream(aggregate_id)
        }

        fn load_all(&self) -> Result<Vec<StoredEvent>, EventStoreError> {
            self.inner.load_all()
        }
    }

    #[test]
    fn retried_movement_is_stamped_when_it_commits() {
        let store = Arc::new(StaleOnce {
            inner: InMemoryEventStore::new(),
            stale_appends: AtomicU32::new(0),
        });
        let bus: Bus = Arc::new(InMemoryEventBus::new());
        let dispatcher = Arc::new(CommandDispatcher::new(store.clone(), bus));
        let read_models = ReadModels::in_memory();

        let base = Utc.with_ymd_and_hms(2024, 5, 10, 8, 0, 0).unwrap();
        let ticks = Arc::new(AtomicI64::new(0));
        let clock_ticks = ticks.clone();
        let service = StockMovementService::new(dispatcher, read_models.parts.clone(), read_models.users.clone())
            .with_clock(Arc::new(move || -> DateTime<Utc> {
                base + chrono::Duration::minutes(clock_ticks.fetch_add(1, Ordering::SeqCst))
            }));

        let part = service.register_part(new_part("RT-1", 10, 0)).unwrap();
        let before = ticks.load(Ordering::SeqCst);

        store.stale_appends.store(1, Ordering::SeqCst);
        let outcome = service.record_exit(exit(part.id, 2)).unwrap();

        assert_eq!(ticks.load(Ordering::SeqCst), before + 2);
        assert_eq!(outcome.movement.occurred_at, base + chrono::Duration::minutes(before + 1));
        assert_eq!(outcome.quantity, 8);
    }
}
