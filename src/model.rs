use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Half-open stay `[check_in, check_out)` in calendar dates.
///
/// Time-of-day never enters conflict math: a checkout and a check-in on the
/// same day do not collide, which is what makes same-day turnover work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stay {
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
}

impl Stay {
    pub fn new(check_in: NaiveDate, check_out: NaiveDate) -> Self {
        Self { check_in, check_out }
    }

    pub fn nights(&self) -> i64 {
        (self.check_out - self.check_in).num_days()
    }

    pub fn overlaps(&self, other: &Stay) -> bool {
        self.check_in < other.check_out && other.check_in < self.check_out
    }

    pub fn contains_day(&self, day: NaiveDate) -> bool {
        self.check_in <= day && day < self.check_out
    }

    /// Returns true if `self` fully contains `other`.
    pub fn contains_stay(&self, other: &Stay) -> bool {
        self.check_in <= other.check_in && other.check_out <= self.check_out
    }
}

/// Concrete kind of bookable unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceType {
    Kennel,
    Run,
    GroomingTable,
    Staff,
    StandardSuite,
    StandardPlusSuite,
    VipSuite,
}

impl ResourceType {
    pub const ALL: [ResourceType; 7] = [
        ResourceType::Kennel,
        ResourceType::Run,
        ResourceType::GroomingTable,
        ResourceType::Staff,
        ResourceType::StandardSuite,
        ResourceType::StandardPlusSuite,
        ResourceType::VipSuite,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceType::Kennel => "KENNEL",
            ResourceType::Run => "RUN",
            ResourceType::GroomingTable => "GROOMING_TABLE",
            ResourceType::Staff => "STAFF",
            ResourceType::StandardSuite => "STANDARD_SUITE",
            ResourceType::StandardPlusSuite => "STANDARD_PLUS_SUITE",
            ResourceType::VipSuite => "VIP_SUITE",
        }
    }

    /// Case-insensitive parse of a concrete type name. Generic categories
    /// ("suite") are NOT types; see [`crate::category`].
    pub fn parse(s: &str) -> Option<ResourceType> {
        let upper = s.to_ascii_uppercase();
        Self::ALL.iter().copied().find(|t| t.as_str() == upper)
    }
}

impl std::fmt::Display for ResourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reservation lifecycle state.
///
/// Only occupying statuses count toward conflicts; everything else leaves
/// the resource free for the same interval while the row survives as a
/// record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReservationStatus {
    Pending,
    Confirmed,
    CheckedIn,
    CheckedOut,
    Completed,
    Cancelled,
    NoShow,
}

impl ReservationStatus {
    pub fn is_occupying(&self) -> bool {
        matches!(
            self,
            ReservationStatus::Pending
                | ReservationStatus::Confirmed
                | ReservationStatus::CheckedIn
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ReservationStatus::Pending => "PENDING",
            ReservationStatus::Confirmed => "CONFIRMED",
            ReservationStatus::CheckedIn => "CHECKED_IN",
            ReservationStatus::CheckedOut => "CHECKED_OUT",
            ReservationStatus::Completed => "COMPLETED",
            ReservationStatus::Cancelled => "CANCELLED",
            ReservationStatus::NoShow => "NO_SHOW",
        }
    }

    pub fn parse(s: &str) -> Option<ReservationStatus> {
        match s.to_ascii_uppercase().as_str() {
            "PENDING" => Some(ReservationStatus::Pending),
            "CONFIRMED" => Some(ReservationStatus::Confirmed),
            "CHECKED_IN" => Some(ReservationStatus::CheckedIn),
            "CHECKED_OUT" => Some(ReservationStatus::CheckedOut),
            "COMPLETED" => Some(ReservationStatus::Completed),
            "CANCELLED" => Some(ReservationStatus::Cancelled),
            "NO_SHOW" => Some(ReservationStatus::NoShow),
            _ => None,
        }
    }

    /// Lifecycle table. Terminal states have no outgoing edges except
    /// CHECKED_OUT → COMPLETED.
    pub fn can_transition_to(&self, next: ReservationStatus) -> bool {
        use ReservationStatus::*;
        match self {
            Pending => matches!(next, Confirmed | CheckedIn | Cancelled | NoShow),
            Confirmed => matches!(next, CheckedIn | Cancelled | NoShow),
            CheckedIn => matches!(next, CheckedOut | Completed),
            CheckedOut => matches!(next, Completed),
            Completed | Cancelled | NoShow => false,
        }
    }
}

impl std::fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One reservation as held inside the engine. The owning resource (or the
/// unassigned pool) is tracked by the engine's reservation index, not here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    pub id: Ulid,
    pub pet_id: Ulid,
    pub customer_id: Ulid,
    pub service_id: Ulid,
    pub stay: Stay,
    pub status: ReservationStatus,
}

#[derive(Debug, Clone)]
pub struct ResourceState {
    pub id: Ulid,
    pub rtype: ResourceType,
    /// Max concurrent occupants (1 for kennels and suites).
    pub capacity: u32,
    /// Soft-disable flag; inactive units take no new reservations.
    pub active: bool,
    /// All reservations on this unit, sorted by `stay.check_in`.
    pub reservations: Vec<Reservation>,
}

impl ResourceState {
    pub fn new(id: Ulid, rtype: ResourceType, capacity: u32, active: bool) -> Self {
        Self {
            id,
            rtype,
            capacity,
            active,
            reservations: Vec::new(),
        }
    }

    /// Insert preserving sort order by check-in date.
    pub fn insert_reservation(&mut self, reservation: Reservation) {
        let pos = self
            .reservations
            .binary_search_by_key(&reservation.stay.check_in, |r| r.stay.check_in)
            .unwrap_or_else(|e| e);
        self.reservations.insert(pos, reservation);
    }

    pub fn remove_reservation(&mut self, id: Ulid) -> Option<Reservation> {
        if let Some(pos) = self.reservations.iter().position(|r| r.id == id) {
            Some(self.reservations.remove(pos))
        } else {
            None
        }
    }

    pub fn reservation(&self, id: Ulid) -> Option<&Reservation> {
        self.reservations.iter().find(|r| r.id == id)
    }

    pub fn reservation_mut(&mut self, id: Ulid) -> Option<&mut Reservation> {
        self.reservations.iter_mut().find(|r| r.id == id)
    }

    /// Return only reservations whose stay overlaps the query window.
    /// Binary search skips everything checking in at or after the window end.
    pub fn overlapping(&self, query: &Stay) -> impl Iterator<Item = &Reservation> {
        let right_bound = self
            .reservations
            .partition_point(|r| r.stay.check_in < query.check_out);
        self.reservations[..right_bound]
            .iter()
            .filter(move |r| r.stay.check_out > query.check_in)
    }
}

/// The event types — flat, no nesting. This is the WAL record format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    ResourceCreated {
        id: Ulid,
        rtype: ResourceType,
        capacity: u32,
        active: bool,
    },
    ResourceUpdated {
        id: Ulid,
        capacity: u32,
        active: bool,
    },
    ResourceDeleted {
        id: Ulid,
    },
    ReservationBooked {
        id: Ulid,
        /// None books into the unassigned pool.
        resource_id: Option<Ulid>,
        pet_id: Ulid,
        customer_id: Ulid,
        service_id: Ulid,
        stay: Stay,
        status: ReservationStatus,
    },
    /// Assignment of an unassigned reservation, or a move between units.
    ReservationAssigned {
        id: Ulid,
        resource_id: Ulid,
    },
    ReservationStatusChanged {
        id: Ulid,
        status: ReservationStatus,
    },
}

// ── Query result types ───────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceInfo {
    pub id: Ulid,
    pub rtype: ResourceType,
    pub capacity: u32,
    pub active: bool,
}

/// Availability row: just enough for a caller to pick a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceSummary {
    pub id: Ulid,
    pub rtype: ResourceType,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReservationInfo {
    pub id: Ulid,
    pub resource_id: Option<Ulid>,
    pub pet_id: Ulid,
    pub customer_id: Ulid,
    pub service_id: Ulid,
    pub stay: Stay,
    pub status: ReservationStatus,
}

/// One item of a batch-allocation request: a pet, a desired category,
/// and a stay. The allocator picks the concrete unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookingRequest {
    pub id: Ulid,
    pub pet_id: Ulid,
    pub customer_id: Ulid,
    pub service_id: Ulid,
    pub category: String,
    pub stay: Stay,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchAssignment {
    pub reservation_id: Ulid,
    pub pet_id: Ulid,
    pub resource_id: Ulid,
}
