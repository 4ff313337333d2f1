/// Request and payment lifecycle rules
///
/// Statuses are stored as text in Postgres; these enums are the only place
/// allowed to decide which transitions are legal.
use crate::errors::ApiError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Pending,
    Accepted,
    Declined,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Accepted => "accepted",
            RequestStatus::Declined => "declined",
        }
    }

    /// Accepted and declined are terminal.
    pub fn can_transition(&self, next: RequestStatus) -> bool {
        matches!(
            (self, next),
            (RequestStatus::Pending, RequestStatus::Accepted)
                | (RequestStatus::Pending, RequestStatus::Declined)
        )
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RequestStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(RequestStatus::Pending),
            "accepted" => Ok(RequestStatus::Accepted),
            "declined" => Ok(RequestStatus::Declined),
            other => Err(format!("unknown request status: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Initiated,
    Paid,
    Refunded,
    Failed,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Initiated => "initiated",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Refunded => "refunded",
            PaymentStatus::Failed => "failed",
        }
    }

    pub fn can_transition(&self, next: PaymentStatus) -> bool {
        matches!(
            (self, next),
            (PaymentStatus::Pending, PaymentStatus::Initiated)
                | (PaymentStatus::Pending, PaymentStatus::Failed)
                | (PaymentStatus::Initiated, PaymentStatus::Paid)
                | (PaymentStatus::Initiated, PaymentStatus::Refunded)
                | (PaymentStatus::Initiated, PaymentStatus::Failed)
                | (PaymentStatus::Paid, PaymentStatus::Refunded)
        )
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(PaymentStatus::Pending),
            "initiated" => Ok(PaymentStatus::Initiated),
            "paid" => Ok(PaymentStatus::Paid),
            "refunded" => Ok(PaymentStatus::Refunded),
            "failed" => Ok(PaymentStatus::Failed),
            other => Err(format!("unknown payment status: {}", other)),
        }
    }
}

/// Parse a stored request status and check the transition, 409 on violation.
pub fn guard_request_transition(
    current: &str,
    next: RequestStatus,
) -> Result<RequestStatus, ApiError> {
    let current = RequestStatus::from_str(current).map_err(|reason| ApiError::Internal { reason })?;
    if !current.can_transition(next) {
        return Err(ApiError::Conflict {
            reason: format!("request is {}, cannot become {}", current, next),
        });
    }
    Ok(next)
}

pub fn guard_payment_transition(
    current: &str,
    next: PaymentStatus,
) -> Result<PaymentStatus, ApiError> {
    let current = PaymentStatus::from_str(current).map_err(|reason| ApiError::Internal { reason })?;
    if !current.can_transition(next) {
        return Err(ApiError::Conflict {
            reason: format!("payment is {}, cannot become {}", current, next),
        });
    }
    Ok(next)
}

/// Split a post price into the initial down payment and the remaining
/// balance. Amounts are centavos; the two parts always sum to the price.
pub fn split_down_payment(price_centavos: i64, down_percent: i64) -> (i64, i64) {
    let down = price_centavos * down_percent / 100;
    (down, price_centavos - down)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn pending_request_can_be_resolved_once() {
        assert!(RequestStatus::Pending.can_transition(RequestStatus::Accepted));
        assert!(RequestStatus::Pending.can_transition(RequestStatus::Declined));
        assert!(!RequestStatus::Accepted.can_transition(RequestStatus::Declined));
        assert!(!RequestStatus::Declined.can_transition(RequestStatus::Accepted));
        assert!(!RequestStatus::Accepted.can_transition(RequestStatus::Pending));
    }

    #[test]
    fn payment_lifecycle_edges() {
        use PaymentStatus::*;
        let legal = [
            (Pending, Initiated),
            (Pending, Failed),
            (Initiated, Paid),
            (Initiated, Refunded),
            (Initiated, Failed),
            (Paid, Refunded),
        ];
        for (from, to) in legal {
            assert!(from.can_transition(to), "{} -> {} should be legal", from, to);
        }
        for (from, to) in [
            (Refunded, Paid),
            (Failed, Paid),
            (Paid, Initiated),
            (Pending, Paid),
            (Pending, Refunded),
        ] {
            assert!(!from.can_transition(to), "{} -> {} must be rejected", from, to);
        }
    }

    #[test]
    fn guard_returns_conflict() {
        let err = guard_request_transition("accepted", RequestStatus::Declined).unwrap_err();
        assert!(matches!(err, ApiError::Conflict { .. }));

        let ok = guard_payment_transition("initiated", PaymentStatus::Paid).unwrap();
        assert_eq!(ok, PaymentStatus::Paid);
    }

    #[test]
    fn down_payment_and_balance_sum_to_price() {
        assert_eq!(split_down_payment(100_000, 20), (20_000, 80_000));
        // Rounding goes to the balance
        assert_eq!(split_down_payment(99_999, 20), (19_999, 80_000));
        assert_eq!(split_down_payment(1, 20), (0, 1));
        let (down, balance) = split_down_payment(123_457, 20);
        assert_eq!(down + balance, 123_457);
    }

    #[test]
    fn statuses_round_trip_through_text() {
        for s in ["pending", "initiated", "paid", "refunded", "failed"] {
            assert_eq!(PaymentStatus::from_str(s).unwrap().as_str(), s);
        }
        assert!(PaymentStatus::from_str("cancelled").is_err());
    }
}
