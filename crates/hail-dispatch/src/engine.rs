//! The negotiation engine: arbitration and orchestration
//!
//! Every inbound command lands here. The engine authenticates the caller
//! against the directory, drives the mutation through the ledger, keeps
//! worker availability in step, and hands composed events to the notifier.
//!
//! Commands for different rides run freely in parallel. Commands for the
//! same ride serialize on a per-ride mutex: the accept path's check-and-set,
//! its busy-marking and its event composition form one indivisible unit, and
//! offer submission is excluded from overlapping with it. Notification
//! dispatch happens only after the section releases; envelopes are built
//! from the in-section snapshot, so late delivery never leaks stale state.

use crate::error::{DispatchError, Result};
use dashmap::DashMap;
use hail_directory::{DirectoryError, PresenceDirectory};
use hail_ledger::{LedgerError, LedgerStats, RideQuery, TripLedger};
use hail_notify::Notifier;
use hail_types::{
    Availability, Offer, PartyId, PartyKind, Ride, RideEvent, RideId, RideStatus,
};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, warn};

/// Orchestrates the offer/accept protocol across ledger, directory and
/// notifier
pub struct DispatchEngine {
    ledger: Arc<TripLedger>,
    directory: Arc<PresenceDirectory>,
    notifier: Arc<Notifier>,
    /// Per-ride critical sections. Entries are dropped when the ride turns
    /// terminal or the id proves dead, so rejected traffic cannot grow the
    /// map.
    guards: DashMap<RideId, Arc<Mutex<()>>>,
    /// Workers told about each ride so far; drives `ride.taken` and
    /// cancellation fan-out. Dropped together with the ride's guard entry.
    audience: DashMap<RideId, HashSet<PartyId>>,
}

impl DispatchEngine {
    pub fn new(
        ledger: Arc<TripLedger>,
        directory: Arc<PresenceDirectory>,
        notifier: Arc<Notifier>,
    ) -> Self {
        Self {
            ledger,
            directory,
            notifier,
            guards: DashMap::new(),
            audience: DashMap::new(),
        }
    }

    pub fn ledger(&self) -> &TripLedger {
        &self.ledger
    }

    pub fn directory(&self) -> &PresenceDirectory {
        &self.directory
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    /// Open a ride and advertise it to every available worker.
    ///
    /// The broadcast is advisory: a worker acting on a ride that has since
    /// left `pending` simply fails its offer, so no lock is held for it.
    pub async fn request_ride(
        &self,
        requester: &PartyId,
        pickup: &str,
        dropoff: &str,
    ) -> Result<Ride> {
        self.require_kind(requester, PartyKind::Requester)?;

        let ride = self
            .ledger
            .create_ride(requester.clone(), pickup, dropoff)
            .await?;

        let workers = self.directory.list_available_workers();
        self.audience
            .insert(ride.ride_id, workers.iter().cloned().collect());

        self.notifier
            .notify(
                &workers,
                RideEvent::Created {
                    ride_id: ride.ride_id,
                    requester: ride.requester.clone(),
                    pickup: ride.pickup.clone(),
                    dropoff: ride.dropoff.clone(),
                },
            )
            .await;

        Ok(ride)
    }

    /// Submit a worker's offer on a pending ride.
    ///
    /// Only the requester hears about it; rival workers learn nothing until
    /// arbitration. A stale ride (already left `pending`) fails with no side
    /// effects.
    pub async fn submit_offer(
        &self,
        worker: &PartyId,
        ride_id: &RideId,
        price: u64,
        eta_minutes: u32,
    ) -> Result<Offer> {
        self.require_kind(worker, PartyKind::Worker)?;

        let guard = self.guard(ride_id);
        let (requester, offer) = {
            let _section = guard.lock().await;
            self.ride_for_update(ride_id).await?;
            let (ride, offer) = self
                .ledger
                .add_offer(ride_id, worker.clone(), price, eta_minutes)
                .await?;
            self.audience
                .entry(*ride_id)
                .or_default()
                .insert(worker.clone());
            (ride.requester, offer)
        };

        self.notifier
            .notify(
                std::slice::from_ref(&requester),
                RideEvent::OfferReceived {
                    ride_id: *ride_id,
                    offer: offer.clone(),
                },
            )
            .await;

        Ok(offer)
    }

    /// Accept `worker`'s offer — the single-winner arbitration.
    ///
    /// Inside the ride's critical section: verify the caller owns the ride,
    /// run the ledger's check-and-set, mark the winner busy. Racing accepts
    /// lose with `RideAlreadyAccepted`. Events go out after release: trip
    /// details to the requester and winner, `ride.taken` to everyone else
    /// who saw the ride.
    pub async fn accept_offer(
        &self,
        requester: &PartyId,
        ride_id: &RideId,
        worker: &PartyId,
    ) -> Result<Ride> {
        self.require_kind(requester, PartyKind::Requester)?;

        let guard = self.guard(ride_id);
        let (settled, accepted, losers) = {
            let _section = guard.lock().await;
            let ride = self.ride_for_update(ride_id).await?;
            if &ride.requester != requester {
                return Err(DispatchError::NotAuthorized(format!(
                    "only the requester of ride {} may accept an offer",
                    ride_id
                )));
            }

            let settled = self.ledger.accept_offer(ride_id, worker).await?;

            if let Err(err) = self.directory.mark_busy(worker) {
                warn!(worker = %worker, %err, "winner could not be marked busy");
            }

            let offer = match settled.winning() {
                Some(offer) => offer.clone(),
                None => {
                    error!(ride = %ride_id, "settled ride has no winning offer");
                    return Ok(settled);
                }
            };
            let accepted = RideEvent::Accepted {
                ride_id: *ride_id,
                offer,
                pickup: settled.pickup.clone(),
                dropoff: settled.dropoff.clone(),
            };
            let losers: Vec<PartyId> = self
                .audience
                .get(ride_id)
                .map(|seen| seen.iter().filter(|p| *p != worker).cloned().collect())
                .unwrap_or_default();
            (settled, accepted, losers)
        };

        self.notifier
            .notify(&[requester.clone(), worker.clone()], accepted)
            .await;
        if !losers.is_empty() {
            self.notifier
                .notify(&losers, RideEvent::Taken { ride_id: *ride_id })
                .await;
        }

        Ok(settled)
    }

    /// Advance an accepted ride along `accepted -> picked_up -> completed`.
    ///
    /// Only the winning worker may drive this. Completion returns the worker
    /// to the available pool.
    pub async fn advance_status(
        &self,
        worker: &PartyId,
        ride_id: &RideId,
        to: RideStatus,
    ) -> Result<Ride> {
        self.require_kind(worker, PartyKind::Worker)?;

        let guard = self.guard(ride_id);
        let (updated, event, requester) = {
            let _section = guard.lock().await;
            let ride = self.ride_for_update(ride_id).await?;
            if ride.winning_worker() != Some(worker) {
                return Err(DispatchError::NotAuthorized(format!(
                    "only the winning worker may advance ride {}",
                    ride_id
                )));
            }
            if !matches!(to, RideStatus::PickedUp | RideStatus::Completed) {
                return Err(DispatchError::Ledger(LedgerError::InvalidTransition {
                    ride_id: *ride_id,
                    from: ride.status,
                    to,
                }));
            }

            let from = ride.status;
            let updated = self.ledger.record_transition(ride_id, to, worker).await?;

            if to == RideStatus::Completed {
                if let Err(err) = self
                    .directory
                    .set_availability(worker, Availability::Available)
                {
                    warn!(worker = %worker, %err, "worker could not be released");
                }
                self.forget_ride(ride_id);
            }

            let changed_at = match to {
                RideStatus::PickedUp => updated.picked_up_at,
                RideStatus::Completed => updated.completed_at,
                _ => None,
            }
            .unwrap_or_else(chrono::Utc::now);
            let event = RideEvent::StatusChanged {
                ride_id: *ride_id,
                from,
                to,
                changed_at,
            };
            (updated, event, ride.requester)
        };

        self.notifier
            .notify(std::slice::from_ref(&requester), event)
            .await;

        Ok(updated)
    }

    /// Cancel a ride from any non-terminal state.
    ///
    /// Only the ride's requester may cancel. A winning worker, if there is
    /// one, goes back to available; everyone who ever heard about the ride
    /// hears that it is gone.
    pub async fn cancel_ride(&self, actor: &PartyId, ride_id: &RideId) -> Result<Ride> {
        self.authenticate(actor)?;

        let guard = self.guard(ride_id);
        let (cancelled, recipients) = {
            let _section = guard.lock().await;
            let ride = self.ride_for_update(ride_id).await?;
            if &ride.requester != actor {
                return Err(DispatchError::NotAuthorized(format!(
                    "only the requester of ride {} may cancel it",
                    ride_id
                )));
            }

            let cancelled = self
                .ledger
                .record_transition(ride_id, RideStatus::Cancelled, actor)
                .await?;

            if let Some(winner) = cancelled.winning_worker() {
                if let Err(err) = self
                    .directory
                    .set_availability(winner, Availability::Available)
                {
                    warn!(worker = %winner, %err, "worker could not be released");
                }
            }

            let mut recipients: Vec<PartyId> = vec![cancelled.requester.clone()];
            if let Some((_, seen)) = self.audience.remove(ride_id) {
                recipients.extend(seen);
            }
            self.guards.remove(ride_id);
            (cancelled, recipients)
        };

        self.notifier
            .notify(
                &recipients,
                RideEvent::Cancelled {
                    ride_id: *ride_id,
                    cancelled_by: actor.clone(),
                },
            )
            .await;

        Ok(cancelled)
    }

    /// Read-only ride snapshot.
    pub async fn get_ride(&self, ride_id: &RideId) -> Result<Option<Ride>> {
        Ok(self.ledger.get_ride(ride_id).await?)
    }

    /// Rides matching a query.
    pub async fn list_rides(&self, query: &RideQuery) -> Result<Vec<Ride>> {
        Ok(self.ledger.list_rides(query).await?)
    }

    /// Ledger-wide counters.
    pub async fn statistics(&self) -> Result<LedgerStats> {
        Ok(self.ledger.statistics().await?)
    }

    /// A worker toggling its own availability.
    pub fn set_availability(&self, worker: &PartyId, availability: Availability) -> Result<()> {
        self.directory
            .set_availability(worker, availability)
            .map_err(|err| match err {
                DirectoryError::PartyNotFound(party) => DispatchError::NotAuthenticated(party),
                DirectoryError::NotAWorker(party) => {
                    DispatchError::NotAuthorized(format!("{} is not a worker", party))
                }
            })
    }

    fn authenticate(&self, party: &PartyId) -> Result<PartyKind> {
        self.directory
            .kind_of(party)
            .ok_or_else(|| DispatchError::NotAuthenticated(party.clone()))
    }

    fn require_kind(&self, party: &PartyId, expected: PartyKind) -> Result<()> {
        let kind = self.authenticate(party)?;
        if kind != expected {
            return Err(DispatchError::NotAuthorized(format!(
                "{} is not a {}",
                party, expected
            )));
        }
        Ok(())
    }

    fn guard(&self, ride_id: &RideId) -> Arc<Mutex<()>> {
        self.guards
            .entry(*ride_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// In-section fetch for a command about to mutate `ride_id`.
    ///
    /// Ride ids are minted fresh at creation and never reused, so an id that
    /// resolves to nothing stays unknown forever; a terminal ride takes no
    /// further commands. Both conditions are permanent, so the entries
    /// `guard` lazily created for the id are dropped on the spot. The command
    /// still reports its usual error for the terminal case.
    async fn ride_for_update(&self, ride_id: &RideId) -> Result<Ride> {
        match self.ledger.get_ride(ride_id).await? {
            Some(ride) => {
                if ride.status.is_terminal() {
                    self.forget_ride(ride_id);
                }
                Ok(ride)
            }
            None => {
                self.forget_ride(ride_id);
                Err(LedgerError::RideNotFound(*ride_id).into())
            }
        }
    }

    fn forget_ride(&self, ride_id: &RideId) {
        self.audience.remove(ride_id);
        self.guards.remove(ride_id);
    }
}
