use super::*;
use std::future::Future;
use std::pin::Pin;

struct FixedDetector {
    tier: u8,
    emissions: Vec<(SessionState, String)>,
}

impl Detector for FixedDetector {
    fn run(
        self: Box<Self>,
        state_tx: mpsc::Sender<(SessionState, String)>,
        _shutdown: CancellationToken,
    ) -> Pin<Box<dyn Future<Output = ()> + Send>> {
        Box::pin(async move {
            for emission in self.emissions {
                if state_tx.send(emission).await.is_err() {
                    break;
                }
            }
        })
    }

    fn tier(&self) -> u8 {
        self.tier
    }
}

#[tokio::test]
async fn higher_tier_cannot_downgrade_lower_tier_state() {
    let tier1 = FixedDetector { tier: 1, emissions: vec![(SessionState::PendingApproval, "hook".into())] };
    let tier3 = FixedDetector { tier: 3, emissions: vec![(SessionState::Working, "noise".into())] };

    let composite = CompositeDetector { tiers: vec![Box::new(tier1), Box::new(tier3)] };
    let (tx, mut rx) = mpsc::channel(16);
    let shutdown = CancellationToken::new();
    let sd = shutdown.clone();

    let handle = tokio::spawn(composite.run(tx, shutdown));
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    sd.cancel();
    let _ = handle.await;

    let mut seen = vec![];
    while let Ok(detected) = rx.try_recv() {
        seen.push(detected.state);
    }
    assert!(seen.contains(&SessionState::PendingApproval));
    assert!(!seen.contains(&SessionState::Working), "tier 3 working must not demote tier 1 pending_approval");
}

#[tokio::test]
async fn lower_tier_may_escalate_priority() {
    let tier4 = FixedDetector {
        tier: 4,
        emissions: vec![(SessionState::Working, "a".into()), (SessionState::WaitingInput, "b".into())],
    };

    let composite = CompositeDetector { tiers: vec![Box::new(tier4)] };
    let (tx, mut rx) = mpsc::channel(16);
    let shutdown = CancellationToken::new();
    let sd = shutdown.clone();

    let handle = tokio::spawn(composite.run(tx, shutdown));
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    sd.cancel();
    let _ = handle.await;

    let mut seen = vec![];
    while let Ok(detected) = rx.try_recv() {
        seen.push(detected.state);
    }
    assert!(seen.contains(&SessionState::WaitingInput));
}
