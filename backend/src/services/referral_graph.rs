//! # Referral Service
//!
//! Signup, referral edge creation and referral statistics.
//!
//! ## Signup Flow
//!
//! ```text
//! 1. Validate phone/name, reject duplicate phone
//!              ↓
//! 2. Resolve referral code (unknown code = no referrer)
//!              ↓
//! 3. Insert user with referred_by = referrer
//!              ↓
//! 4. Walk up to 3 ancestors through referred_by
//!              ↓
//! 5. One team_referrals edge per ancestor (A, B, C)
//!              ↓
//! 6. Update counters and the referrer's team level
//!              ↓
//! 7. Pay signup commissions
//! ```
//!
//! All steps run in one database transaction.
//!
//! ## Chains
//!
//! Only the parent pointer (`users.referred_by`) is stored. The chain for
//! an edge is derived by walking it and is ordered from the receiving
//! ancestor down to the new user:
//!
//! ```text
//! U1 <- U2 <- U3 (referrer) <- U4 (new)
//!
//! tier A: U3  chain [U3, U4]
//! tier B: U2  chain [U2, U3, U4]
//! tier C: U1  chain [U1, U2, U3, U4]
//! ```

use chrono::Utc;
use tokio_postgres::GenericClient;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::db::queries;
use crate::db::{CommissionType, Database, NewUser, ReferralTier, TeamReferralHistoryRecord, TeamReferralRecord};
use crate::error::LedgerError;
use crate::models::{ReferralStatsResponse, SignupRequest, SignupResponse, TierSummary};
use crate::utils::generate_referral_code;

use super::commission;

/// Attempts at finding an unused referral code before giving up.
const REFERRAL_CODE_ATTEMPTS: usize = 5;

/// One edge to create: `ancestor_id` earns from the new user at `tier`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedEdge {
    pub tier: ReferralTier,
    pub ancestor_id: Uuid,

    /// Receiving ancestor first, triggering user last.
    pub chain: Vec<Uuid>,
}

/// Turn an upline (nearest ancestor first) into at most three edges.
pub fn plan_edges(user_id: Uuid, upline: &[Uuid]) -> Vec<PlannedEdge> {
    upline
        .iter()
        .zip(ReferralTier::UPLINE)
        .enumerate()
        .map(|(depth, (&ancestor_id, tier))| {
            let mut chain: Vec<Uuid> = upline[..=depth].iter().rev().copied().collect();
            chain.push(user_id);
            PlannedEdge { tier, ancestor_id, chain }
        })
        .collect()
}

/// Team classification for a number of direct referrals.
///
/// 0 leaves the level unset, 1 gives B, 2 or more give C.
pub fn team_level_for(direct_referrals: i32) -> Option<ReferralTier> {
    match direct_referrals {
        n if n >= 2 => Some(ReferralTier::C),
        1 => Some(ReferralTier::B),
        _ => None,
    }
}

/// Collect up to three ancestors starting at `referrer_id`, nearest first.
///
/// Stops at the root, at a missing user, or at any id already seen
/// (including `user_id` itself).
pub async fn walk_upline<C: GenericClient + Sync>(
    client: &C,
    user_id: Uuid,
    referrer_id: Uuid,
) -> Result<Vec<Uuid>, LedgerError> {
    let max = ReferralTier::UPLINE.len();
    let mut upline = Vec::with_capacity(max);
    let mut next = Some(referrer_id);

    while let Some(current) = next {
        if upline.len() == max {
            break;
        }
        if current == user_id || upline.contains(&current) {
            warn!("Referral cycle detected at {} while walking from {}", current, user_id);
            break;
        }
        upline.push(current);

        next = match queries::get_referrer(client, current).await? {
            Some(parent) => parent,
            None => {
                warn!("Referral chain broken: user {} not found", current);
                None
            }
        };
    }

    debug!("Upline of {}: {:?}", user_id, upline);
    Ok(upline)
}

/// Signup and referral statistics.
///
/// ## Usage
///
/// ```rust,ignore
/// let referrals = ReferralService::new(db.clone());
/// let created = referrals.signup(request).await?;
/// println!("{} edges", created.tiers_created);
/// ```
#[derive(Clone)]
pub struct ReferralService {
    db: Database,
}

impl ReferralService {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Create a user, its referral edges and the signup commissions.
    pub async fn signup(&self, request: SignupRequest) -> Result<SignupResponse, LedgerError> {
        let phone = request.phone.trim().to_string();
        let name = request.name.trim().to_string();
        if phone.is_empty() {
            return Err(LedgerError::Validation("Phone number is required".to_string()));
        }
        if name.is_empty() {
            return Err(LedgerError::Validation("Name is required".to_string()));
        }
        let supplied_code = request
            .referral_code
            .as_deref()
            .map(|c| c.trim().to_uppercase())
            .filter(|c| !c.is_empty());

        info!("Signup requested for phone {}", phone);

        let mut client = self.db.client().await?;
        let tx = client.transaction().await?;

        if queries::phone_exists(&*tx, &phone).await? {
            return Err(LedgerError::Conflict("Phone number already registered".to_string()));
        }

        let referrer = match supplied_code.as_deref() {
            Some(code) => {
                let found = queries::get_user_by_referral_code(&*tx, code).await?;
                if found.is_none() {
                    info!("Referral code {} not found, signing up without referrer", code);
                }
                found
            }
            None => None,
        };

        let user_id = Uuid::new_v4();
        let referral_code = self.unused_referral_code(&*tx).await?;

        if supplied_code.as_deref() == Some(referral_code.as_str())
            || referrer.as_ref().map(|r| r.id) == Some(user_id)
        {
            return Err(LedgerError::Validation("You cannot use your own referral code".to_string()));
        }

        let user = queries::insert_user(
            &*tx,
            &NewUser {
                id: user_id,
                phone,
                name,
                referral_code,
                referred_by: referrer.as_ref().map(|r| r.id),
            },
        )
        .await?;

        let mut tiers_created = 0;
        let mut commissions = Vec::new();

        if let Some(referrer) = &referrer {
            let upline = walk_upline(&*tx, user.id, referrer.id).await?;
            let edges = plan_edges(user.id, &upline);
            let now = Utc::now();

            for edge in &edges {
                queries::insert_team_referral(
                    &*tx,
                    &TeamReferralRecord {
                        id: Uuid::new_v4(),
                        user_id: edge.ancestor_id,
                        referred_user_id: user.id,
                        tier: edge.tier.as_str().to_string(),
                        is_active: true,
                        total_earnings: rust_decimal::Decimal::ZERO,
                        created_at: now,
                    },
                )
                .await?;

                if edge.tier == ReferralTier::A {
                    let direct_count =
                        queries::increment_referral_counters(&*tx, edge.ancestor_id).await?;
                    if let Some(team_level) = team_level_for(direct_count) {
                        queries::set_team_level(&*tx, edge.ancestor_id, Some(team_level.as_str())).await?;
                        debug!("Team level of {} is now {}", edge.ancestor_id, team_level);
                    }
                }
            }
            tiers_created = edges.len();

            commissions = commission::distribute(
                &*tx,
                user.id,
                &user.name,
                &edges,
                CommissionType::SignupBonus,
                now,
            )
            .await?;
        }

        tx.commit().await?;

        info!(
            "✅ User {} signed up ({} referral edges, {} commissions)",
            user.id, tiers_created, commissions.len()
        );

        Ok(SignupResponse {
            user: user.into(),
            tiers_created,
            commissions,
        })
    }

    async fn unused_referral_code<C: GenericClient + Sync>(
        &self,
        client: &C,
    ) -> Result<String, LedgerError> {
        for attempt in 1..=REFERRAL_CODE_ATTEMPTS {
            let code = generate_referral_code();
            if !queries::referral_code_exists(client, &code).await? {
                return Ok(code);
            }
            debug!("Referral code collision on attempt {}", attempt);
        }
        Err(LedgerError::Internal(
            "Could not generate a unique referral code".to_string(),
        ))
    }

    /// Team size, earnings per tier and counters for a user.
    pub async fn referral_stats(&self, user_id: Uuid) -> Result<ReferralStatsResponse, LedgerError> {
        let client = self.db.client().await?;

        let user = queries::get_user(&**client, user_id)
            .await?
            .ok_or_else(|| LedgerError::NotFound(format!("User not found: {}", user_id)))?;

        let summary = queries::referral_tier_summary(&**client, user_id).await?;
        let total_commission = queries::total_commission_earned(&**client, user_id).await?;

        let tiers = ReferralTier::UPLINE
            .iter()
            .map(|tier| {
                summary
                    .iter()
                    .find(|(t, _, _)| t == tier.as_str())
                    .map(|(t, members, earnings)| TierSummary {
                        tier: t.clone(),
                        members: *members,
                        earnings: *earnings,
                    })
                    .unwrap_or_else(|| TierSummary {
                        tier: tier.as_str().to_string(),
                        members: 0,
                        earnings: rust_decimal::Decimal::ZERO,
                    })
            })
            .collect();

        Ok(ReferralStatsResponse {
            referral_code: user.referral_code,
            team_level: user.team_level,
            direct_referrals_count: user.direct_referrals_count,
            total_referrals: user.total_referrals,
            total_commission,
            tiers,
        })
    }

    /// Commission history received by a user, newest first.
    pub async fn history(
        &self,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<TeamReferralHistoryRecord>, LedgerError> {
        let client = self.db.client().await?;
        Ok(queries::list_referral_history(&**client, user_id, limit, offset).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_three_tier_fan_out() {
        let (new_user, u3, u2, u1) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let edges = plan_edges(new_user, &[u3, u2, u1]);

        assert_eq!(edges.len(), 3);
        assert_eq!(edges[0], PlannedEdge { tier: ReferralTier::A, ancestor_id: u3, chain: vec![u3, new_user] });
        assert_eq!(edges[1], PlannedEdge { tier: ReferralTier::B, ancestor_id: u2, chain: vec![u2, u3, new_user] });
        assert_eq!(edges[2], PlannedEdge { tier: ReferralTier::C, ancestor_id: u1, chain: vec![u1, u2, u3, new_user] });
    }

    #[test]
    fn test_partial_chain_stops_at_root() {
        let (new_user, referrer) = (Uuid::new_v4(), Uuid::new_v4());
        let edges = plan_edges(new_user, &[referrer]);
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].tier, ReferralTier::A);

        assert!(plan_edges(new_user, &[]).is_empty());
    }

    #[test]
    fn test_upline_longer_than_three_is_cut() {
        let new_user = Uuid::new_v4();
        let upline: Vec<Uuid> = (0..5).map(|_| Uuid::new_v4()).collect();
        let edges = plan_edges(new_user, &upline);
        assert_eq!(edges.len(), 3);
        assert_eq!(edges[2].ancestor_id, upline[2]);
    }

    #[test]
    fn test_team_level_thresholds() {
        assert_eq!(team_level_for(0), None);
        assert_eq!(team_level_for(1), Some(ReferralTier::B));
        assert_eq!(team_level_for(2), Some(ReferralTier::C));
        assert_eq!(team_level_for(3), Some(ReferralTier::C));
        assert_eq!(team_level_for(40), Some(ReferralTier::C));
    }
}
