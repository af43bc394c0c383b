//! # Verification Gate
//!
//! Stateless authority and resource checks. Every verdict is computed from a
//! fresh fact query and a pure comparison; nothing is remembered between
//! calls.

use shared_types::{now_millis, ActionType, AuthorityLevel, RealmId, ResourceAmount, ResourceId};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::domain::{
    Available, FactError, GateError, Granted, OrderRecord, OrderTake, RealmInfo,
    ResourceShortfall, VerificationReport,
};
use crate::ports::FactProvider;

/// Pure comparison behind [`check_authority`].
pub fn authority_satisfied(granted: AuthorityLevel, required: AuthorityLevel) -> bool {
    granted >= required
}

/// Sum requested amounts per resource type.
pub fn aggregate(resources: &[ResourceAmount]) -> BTreeMap<ResourceId, u64> {
    let mut totals = BTreeMap::new();
    for r in resources {
        let slot = totals.entry(r.resource).or_insert(0u64);
        *slot = slot.saturating_add(r.amount);
    }
    totals
}

async fn lookup_realm(
    realm: &RealmId,
    provider: &dyn FactProvider,
) -> Result<Option<RealmInfo>, GateError> {
    match provider.realm_info(realm).await {
        Ok(info) => Ok(Some(info)),
        Err(FactError::UnknownRealm(_)) => Ok(None),
        Err(e) => Err(GateError::Provider(e)),
    }
}

/// Check that `realm` holds at least `required` authority.
///
/// A realm unknown to the fact source holds no authority.
pub async fn check_authority(
    realm: &RealmId,
    action: ActionType,
    required: AuthorityLevel,
    provider: &dyn FactProvider,
) -> Result<Granted, GateError> {
    let granted = lookup_realm(realm, provider)
        .await?
        .map(|info| info.authority());

    match granted {
        Some(level) if authority_satisfied(level, required) => {
            debug!(realm = %realm, action = %action, granted = %level, "Authority granted");
            Ok(Granted {
                realm: realm.clone(),
                level,
            })
        }
        _ => {
            debug!(
                realm = %realm,
                action = %action,
                required = %required,
                granted = ?granted,
                "Authority insufficient"
            );
            Err(GateError::InsufficientAuthority {
                realm: realm.clone(),
                required,
                granted,
            })
        }
    }
}

/// Check that `realm` currently holds every requested resource amount.
///
/// Balances are queried on every call. Duplicate resource entries are summed
/// before comparison; a resource the realm does not hold counts as zero.
pub async fn check_resource_availability(
    realm: &RealmId,
    resources: &[ResourceAmount],
    provider: &dyn FactProvider,
) -> Result<Available, GateError> {
    let requested = aggregate(resources);
    let checked: Vec<ResourceAmount> = requested
        .iter()
        .map(|(&resource, &amount)| ResourceAmount::new(resource, amount))
        .collect();

    if requested.values().all(|&amount| amount == 0) {
        return Ok(Available {
            realm: realm.clone(),
            checked,
        });
    }

    let held: BTreeMap<ResourceId, u64> = match lookup_realm(realm, provider).await? {
        Some(info) => match provider.resource_balances(info.entity_id).await {
            Ok(balances) => balances.into_iter().map(|b| (b.resource, b.balance)).collect(),
            Err(FactError::UnknownEntity(_)) => BTreeMap::new(),
            Err(e) => return Err(GateError::Provider(e)),
        },
        None => BTreeMap::new(),
    };

    let shortfalls: Vec<ResourceShortfall> = requested
        .iter()
        .filter_map(|(&resource, &amount)| {
            let available = held.get(&resource).copied().unwrap_or(0);
            (available < amount).then_some(ResourceShortfall {
                resource,
                requested: amount,
                available,
            })
        })
        .collect();

    if shortfalls.is_empty() {
        Ok(Available {
            realm: realm.clone(),
            checked,
        })
    } else {
        debug!(realm = %realm, shortfalls = shortfalls.len(), "Resources unavailable");
        Err(GateError::ResourcesUnavailable {
            realm: realm.clone(),
            shortfalls,
        })
    }
}

/// Run the authority check, then the resource check, for one proposal.
///
/// Verdicts land in the report; only fact source faults come back as `Err`.
pub async fn verify_proposal(
    subject: &RealmId,
    action: ActionType,
    volume: u64,
    committed: &[ResourceAmount],
    provider: &dyn FactProvider,
) -> Result<VerificationReport, GateError> {
    let required_level = AuthorityLevel::required_for(action, volume);
    let mut report = VerificationReport {
        subject: subject.clone(),
        action,
        volume,
        required_level,
        granted_level: None,
        failure: None,
    };

    match check_authority(subject, action, required_level, provider).await {
        Ok(granted) => report.granted_level = Some(granted.level),
        Err(err) if err.is_verdict() => {
            if let GateError::InsufficientAuthority { granted, .. } = &err {
                report.granted_level = *granted;
            }
            report.failure = Some(err);
            return Ok(report);
        }
        Err(err) => return Err(err),
    }

    match check_resource_availability(subject, committed, provider).await {
        Ok(_) => {}
        Err(err) if err.is_verdict() => report.failure = Some(err),
        Err(err) => {
            warn!(realm = %subject, error = %err, "Resource check could not complete");
            return Err(err);
        }
    }

    Ok(report)
}

/// Check that `take.taker` may take open order `take.trade_id` from
/// `take.maker` on exactly the order's terms.
///
/// Open orders are queried on every call. Amounts are compared per resource
/// type, so entry order and duplicates do not matter.
pub async fn check_order(
    take: &OrderTake<'_>,
    now_secs: u64,
    provider: &dyn FactProvider,
) -> Result<OrderRecord, GateError> {
    let unavailable = || GateError::OrderUnavailable {
        trade_id: take.trade_id,
        taker: take.taker.clone(),
    };
    let (Some(maker), Some(taker)) = (
        lookup_realm(take.maker, provider).await?,
        lookup_realm(take.taker, provider).await?,
    ) else {
        return Err(unavailable());
    };

    let order = provider
        .open_orders()
        .await
        .map_err(GateError::Provider)?
        .into_iter()
        .find(|o| o.trade_id == take.trade_id)
        .ok_or_else(unavailable)?;

    let priced = aggregate(&order.taker_gives) == aggregate(take.pays)
        && aggregate(&order.maker_gives) == aggregate(take.receives);
    if order.maker_id != maker.entity_id
        || !order.open_to(taker.entity_id)
        || order.is_expired(now_secs)
        || !priced
    {
        debug!(
            trade_id = take.trade_id,
            maker = %take.maker,
            taker = %take.taker,
            priced,
            "Order unavailable"
        );
        return Err(unavailable());
    }
    Ok(order)
}

/// Gate bound to one fact source.
#[derive(Clone)]
pub struct VerificationGate {
    facts: Arc<dyn FactProvider>,
}

impl VerificationGate {
    /// Create a gate over `facts`.
    pub fn new(facts: Arc<dyn FactProvider>) -> Self {
        Self { facts }
    }

    /// The fact source this gate queries.
    pub fn facts(&self) -> &Arc<dyn FactProvider> {
        &self.facts
    }

    /// See [`check_authority`].
    pub async fn check_authority(
        &self,
        realm: &RealmId,
        action: ActionType,
        required: AuthorityLevel,
    ) -> Result<Granted, GateError> {
        check_authority(realm, action, required, self.facts.as_ref()).await
    }

    /// See [`check_resource_availability`].
    pub async fn check_resource_availability(
        &self,
        realm: &RealmId,
        resources: &[ResourceAmount],
    ) -> Result<Available, GateError> {
        check_resource_availability(realm, resources, self.facts.as_ref()).await
    }

    /// See [`verify_proposal`].
    pub async fn verify_proposal(
        &self,
        subject: &RealmId,
        action: ActionType,
        volume: u64,
        committed: &[ResourceAmount],
    ) -> Result<VerificationReport, GateError> {
        verify_proposal(subject, action, volume, committed, self.facts.as_ref()).await
    }

    /// See [`check_order`]. Expiry is judged against the current clock.
    pub async fn check_order(&self, take: &OrderTake<'_>) -> Result<OrderRecord, GateError> {
        check_order(take, now_millis() / 1000, self.facts.as_ref()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::InMemoryFactProvider;
    use proptest::prelude::*;
    use shared_types::{reasons, resources};

    fn facts() -> InMemoryFactProvider {
        InMemoryFactProvider::new()
            .with_realm(RealmInfo::new("6933", 101, 2))
            .with_realm(RealmInfo::new("7777", 202, 5))
            .with_balance(101, resources::WOOD, 1_000)
            .with_balance(101, resources::STONE, 800)
            .with_balance(202, resources::WOOD, 2_000)
    }

    fn realm(id: &str) -> RealmId {
        RealmId::from(id)
    }

    #[tokio::test]
    async fn test_authority_granted() {
        let facts = facts();
        let granted = check_authority(
            &realm("7777"),
            ActionType::Alliance,
            AuthorityLevel::Level4,
            &facts,
        )
        .await
        .unwrap();
        assert_eq!(granted.level, AuthorityLevel::Level5);
    }

    #[tokio::test]
    async fn test_authority_insufficient() {
        let facts = facts();
        let err = check_authority(
            &realm("6933"),
            ActionType::Trade,
            AuthorityLevel::Level3,
            &facts,
        )
        .await
        .unwrap_err();
        assert_eq!(err.reason(), reasons::INSUFFICIENT_AUTHORITY);
    }

    #[tokio::test]
    async fn test_unknown_realm_has_no_authority() {
        let facts = facts();
        let err = check_authority(
            &realm("42"),
            ActionType::Greeting,
            AuthorityLevel::Level1,
            &facts,
        )
        .await
        .unwrap_err();
        assert!(matches!(
            err,
            GateError::InsufficientAuthority { granted: None, .. }
        ));
    }

    #[tokio::test]
    async fn test_resources_available() {
        let facts = facts();
        let ok = check_resource_availability(
            &realm("6933"),
            &[
                ResourceAmount::new(resources::WOOD, 600),
                ResourceAmount::new(resources::WOOD, 400),
            ],
            &facts,
        )
        .await
        .unwrap();
        assert_eq!(ok.checked, vec![ResourceAmount::new(resources::WOOD, 1_000)]);
    }

    #[tokio::test]
    async fn test_resources_unavailable_lists_shortfalls() {
        let facts = facts();
        let err = check_resource_availability(
            &realm("6933"),
            &[
                ResourceAmount::new(resources::WOOD, 1_001),
                ResourceAmount::new(resources::GOLD, 1),
            ],
            &facts,
        )
        .await
        .unwrap_err();
        match err {
            GateError::ResourcesUnavailable { shortfalls, .. } => {
                assert_eq!(shortfalls.len(), 2);
                assert_eq!(shortfalls[0].available, 1_000);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_balances_are_queried_fresh() {
        let facts = facts();
        let wood = [ResourceAmount::new(resources::WOOD, 900)];
        assert!(check_resource_availability(&realm("6933"), &wood, &facts)
            .await
            .is_ok());

        facts.debit(101, resources::WOOD, 500);

        assert!(check_resource_availability(&realm("6933"), &wood, &facts)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_verify_proposal_over_ceiling() {
        let facts = facts();
        let report = verify_proposal(
            &realm("6933"),
            ActionType::Trade,
            150_000,
            &[ResourceAmount::new(resources::WOOD, 100)],
            &facts,
        )
        .await
        .unwrap();
        assert_eq!(report.required_level, AuthorityLevel::Level3);
        assert_eq!(report.granted_level, Some(AuthorityLevel::Level2));
        assert_eq!(report.reason(), Some(reasons::INSUFFICIENT_AUTHORITY));
    }

    #[tokio::test]
    async fn test_verify_proposal_passes() {
        let gate = VerificationGate::new(Arc::new(facts()));
        let report = gate
            .verify_proposal(
                &realm("6933"),
                ActionType::Trade,
                1_100,
                &[ResourceAmount::new(resources::WOOD, 1_000)],
            )
            .await
            .unwrap();
        assert!(report.is_granted());
    }

    #[tokio::test]
    async fn test_provider_fault_is_err_not_verdict() {
        let facts = facts();
        facts.set_unavailable(true);
        let result = verify_proposal(&realm("6933"), ActionType::Trade, 10, &[], &facts).await;
        assert!(matches!(result, Err(GateError::Provider(_))));
    }

    fn open_order(facts: &InMemoryFactProvider) {
        facts.add_order(OrderRecord {
            trade_id: 789,
            maker_id: 202,
            taker_id: 0,
            maker_gives: vec![ResourceAmount::new(resources::WOOD, 100)],
            taker_gives: vec![
                ResourceAmount::new(resources::STONE, 30),
                ResourceAmount::new(resources::STONE, 20),
            ],
            expires_at: 2_000,
        });
    }

    fn take<'a>(
        trade_id: u64,
        maker: &'a RealmId,
        taker: &'a RealmId,
        pays: &'a [ResourceAmount],
        receives: &'a [ResourceAmount],
    ) -> OrderTake<'a> {
        OrderTake {
            trade_id,
            maker,
            taker,
            pays,
            receives,
        }
    }

    #[tokio::test]
    async fn test_check_order_matches_aggregated_terms() {
        let facts = facts();
        open_order(&facts);
        let (maker, taker) = (realm("7777"), realm("6933"));
        let pays = [ResourceAmount::new(resources::STONE, 50)];
        let receives = [ResourceAmount::new(resources::WOOD, 100)];

        let order = check_order(&take(789, &maker, &taker, &pays, &receives), 1_000, &facts)
            .await
            .unwrap();
        assert_eq!(order.maker_id, 202);
    }

    #[tokio::test]
    async fn test_check_order_refusals() {
        let facts = facts();
        open_order(&facts);
        let (maker, taker) = (realm("7777"), realm("6933"));
        let pays = [ResourceAmount::new(resources::STONE, 50)];
        let cheaper = [ResourceAmount::new(resources::STONE, 49)];
        let receives = [ResourceAmount::new(resources::WOOD, 100)];

        let cases = [
            (take(1, &maker, &taker, &pays, &receives), 1_000),
            (take(789, &taker, &maker, &pays, &receives), 1_000),
            (take(789, &maker, &taker, &cheaper, &receives), 1_000),
            (take(789, &maker, &taker, &pays, &receives), 2_000),
        ];
        for (request, now) in &cases {
            let err = check_order(request, *now, &facts).await.unwrap_err();
            assert_eq!(err.reason(), reasons::ORDER_UNAVAILABLE);
            assert!(err.is_verdict());
        }
    }

    #[tokio::test]
    async fn test_check_order_reserved_for_named_taker() {
        let facts = facts();
        facts.insert_realm(RealmInfo::new("4242", 303, 3));
        facts.add_order(OrderRecord {
            trade_id: 5,
            maker_id: 202,
            taker_id: 303,
            maker_gives: vec![],
            taker_gives: vec![],
            expires_at: 0,
        });
        let maker = realm("7777");
        let named = realm("4242");
        let other = realm("6933");

        assert!(check_order(&take(5, &maker, &named, &[], &[]), u64::MAX, &facts)
            .await
            .is_ok());
        assert!(check_order(&take(5, &maker, &other, &[], &[]), 0, &facts)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_check_order_provider_fault() {
        let facts = facts();
        open_order(&facts);
        facts.set_unavailable(true);
        let (maker, taker) = (realm("7777"), realm("6933"));
        let result = check_order(&take(789, &maker, &taker, &[], &[]), 0, &facts).await;
        assert!(matches!(result, Err(GateError::Provider(_))));
    }

    fn arb_level() -> impl Strategy<Value = AuthorityLevel> {
        prop::sample::select(AuthorityLevel::ALL.to_vec())
    }

    proptest! {
        #[test]
        fn prop_authority_granted_iff_level_at_least_required(
            level in 1u8..=5,
            required in arb_level(),
        ) {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_time()
                .build()
                .unwrap();
            let facts = InMemoryFactProvider::new().with_realm(RealmInfo::new("r", 1, level));
            let granted = AuthorityLevel::from_realm_level(level);
            let result = runtime.block_on(check_authority(
                &RealmId::from("r"),
                ActionType::Trade,
                required,
                &facts,
            ));
            prop_assert_eq!(result.is_ok(), granted >= required);
            prop_assert_eq!(result.is_ok(), authority_satisfied(granted, required));

            // Gate holds no state: the facts are unchanged.
            let info = runtime.block_on(facts.realm_info(&RealmId::from("r"))).unwrap();
            prop_assert_eq!(info.level, level);
        }
    }
}
