//! End-to-end match scenarios driven through the public API on logical time

use std::time::{Duration, Instant};

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tokio_test::{assert_err, assert_ok};
use uuid::Uuid;

use artillery_server::config::GameConfig;
use artillery_server::game::physics::{PhysicsEngine, Vec2};
use artillery_server::game::rules::RuleSet;
use artillery_server::game::session::{
    ActionError, Dispatch, GameSession, ImpactKind, Participant, SessionStatus,
};
use artillery_server::game::terrain::Terrain;
use artillery_server::game::weapons::{Ammo, WeaponKind};
use artillery_server::matchmaking::{MatchmakingQueue, QueuedPlayer};
use artillery_server::ws::protocol::ServerMsg;

const SURFACE: f32 = 200.0;
const IDLE_LIMIT_MS: u64 = 120_000;

struct Duel {
    session: GameSession,
    alice: Uuid,
    bob: Uuid,
}

fn duel(rules: RuleSet) -> Duel {
    let alice = Uuid::new_v4();
    let bob = Uuid::new_v4();
    let config = GameConfig::default();
    let mut session = GameSession::with_terrain(
        Uuid::new_v4(),
        vec![Participant::human(alice, "Alice"), Participant::human(bob, "Bob")],
        rules,
        config,
        Terrain::flat(config.width, config.height, SURFACE),
        ChaCha8Rng::seed_from_u64(42),
    );
    session.set_wind(0.0);
    Duel {
        session,
        alice,
        bob,
    }
}

#[test]
fn standard_shot_on_flat_ground_craters_the_landing_column() {
    let Duel {
        mut session,
        alice,
        bob,
    } = duel(RuleSet::default());
    // Keep Bob well clear of the landing zone
    session.place_player(bob, 1100.0);

    let start = session.player(alice).unwrap().position;
    let target_x = start.x + 500.0;
    let power = (500.0 * 980.0_f32).sqrt() / 800.0 * 100.0;
    let predicted = PhysicsEngine::flat_ground_range(start, 45.0, power, 980.0);
    assert!((predicted - target_x).abs() < 1.0);

    let report = assert_ok!(session.submit_action(alice, 45.0, power, WeaponKind::Standard));
    assert_eq!(report.kind, ImpactKind::Terrain);
    assert!((report.impact.x - target_x).abs() < 30.0);

    let column = report.impact.x.floor() as usize;
    let before = session.terrain().heights()[column];
    session.run_until_idle(IDLE_LIMIT_MS);

    assert!(session.terrain().heights()[column] < before);
    assert_eq!(session.player(bob).unwrap().hp, 100);
    assert_eq!(session.player(alice).unwrap().stats.shots_fired, 1);
    assert_eq!(session.current_player().id, bob);
}

#[test]
fn firing_an_empty_weapon_changes_nothing() {
    let mut rules = RuleSet::default();
    if let Some(rule) = rules.weapons.get_mut(&WeaponKind::Mirv) {
        rule.ammo = Ammo::Count(0);
    }
    let Duel {
        mut session, alice, ..
    } = duel(rules);

    let hp_before: Vec<u32> = session.players().iter().map(|p| p.hp).collect();
    let inventory_before = session.player(alice).unwrap().inventory.clone();

    let err = assert_err!(session.submit_action(alice, 45.0, 60.0, WeaponKind::Mirv));
    assert_eq!(err, ActionError::OutOfAmmo(WeaponKind::Mirv));
    assert_eq!(err.code(), "OUT_OF_AMMO");

    let hp_after: Vec<u32> = session.players().iter().map(|p| p.hp).collect();
    assert_eq!(hp_after, hp_before);
    assert_eq!(session.player(alice).unwrap().inventory, inventory_before);
    assert_eq!(session.turn_index(), 0);
    assert_eq!(session.turn_number(), 1);
    assert!(!session.shot_in_flight());
}

#[test]
fn digger_burrows_past_the_first_contact() {
    let Duel {
        mut session, alice, ..
    } = duel(RuleSet::default());

    let report = assert_ok!(session.submit_action(alice, 60.0, 50.0, WeaponKind::Digger));
    assert_eq!(report.kind, ImpactKind::Terrain);
    assert_eq!(report.terrain_contacts, 4);

    let first = report.first_terrain_contact.unwrap();
    assert!(report.impact.y > first.y);
}

#[test]
fn turns_rotate_round_robin() {
    let Duel {
        mut session,
        alice,
        bob,
    } = duel(RuleSet::default());

    // Both players lob shots off the edge of the playfield
    for n in 1..=6u32 {
        let (shooter, angle) = if session.current_player().id == alice {
            (alice, 135.0)
        } else {
            (bob, 45.0)
        };
        let report = assert_ok!(session.submit_action(shooter, angle, 100.0, WeaponKind::Standard));
        assert_eq!(report.kind, ImpactKind::OutOfBounds);
        session.run_until_idle(IDLE_LIMIT_MS);

        assert_eq!(session.turn_index(), (n % 2) as usize);
        assert_eq!(session.turn_number(), n + 1);
    }
    assert!(session.players().iter().all(|p| p.hp == 100));
}

#[test]
fn last_tank_standing_wins() {
    let mut rules = RuleSet::default();
    if let Some(rule) = rules.weapons.get_mut(&WeaponKind::Standard) {
        rule.damage = 100;
    }
    assert_ok!(rules.validate());
    let Duel {
        mut session,
        alice,
        bob,
    } = duel(rules);

    let alice_x = session.player(alice).unwrap().position.x;
    session.place_player(bob, alice_x + 60.0);

    // Point-blank hit on Bob
    let report = assert_ok!(session.submit_action(alice, 0.0, 100.0, WeaponKind::Standard));
    assert_eq!(report.kind, ImpactKind::Tank(bob));
    session.run_until_idle(IDLE_LIMIT_MS);
    assert!(session.player(bob).unwrap().hp < 100);
    assert_eq!(session.status(), SessionStatus::Active);

    // Bob's weak vertical shot lands on himself
    assert_ok!(session.submit_action(bob, 90.0, 5.0, WeaponKind::Standard));
    session.run_until_idle(IDLE_LIMIT_MS);

    assert_eq!(session.status(), SessionStatus::Completed);
    assert_eq!(session.winner(), Some(alice));
    assert_eq!(session.player(alice).unwrap().hp, 100);

    let game_over = session.drain_outbox().into_iter().find_map(|d| match d {
        Dispatch::All(ServerMsg::GameOver { winner, statistics }) => Some((winner, statistics)),
        _ => None,
    });
    let (winner, statistics) = game_over.unwrap();
    assert_eq!(winner, Some(alice));
    let alice_stats = statistics.players.iter().find(|p| p.id == alice).unwrap();
    assert_eq!(alice_stats.shots_hit, 1);
    assert_eq!(alice_stats.accuracy, 1.0);

    let summary = session.take_summary().unwrap();
    assert_eq!(summary.winner, Some(alice));

    assert_eq!(
        session.submit_action(bob, 45.0, 50.0, WeaponKind::Standard),
        Err(ActionError::NotActive)
    );
}

#[test]
fn same_seed_same_match() {
    let config = GameConfig::default();
    let ids = [Uuid::new_v4(), Uuid::new_v4()];
    let build = || {
        let mut s = GameSession::new(
            Uuid::nil(),
            vec![Participant::human(ids[0], "Alice"), Participant::human(ids[1], "Bob")],
            RuleSet::default(),
            config,
            1234,
        );
        s.submit_action(ids[0], 50.0, 70.0, WeaponKind::Cluster).unwrap();
        s.run_until_idle(IDLE_LIMIT_MS);
        s
    };

    let a = build();
    let b = build();
    assert_eq!(a.terrain(), b.terrain());
    assert_eq!(a.wind(), b.wind());
    let positions = |s: &GameSession| s.players().iter().map(|p| (p.position, p.hp)).collect::<Vec<(Vec2, u32)>>();
    assert_eq!(positions(&a), positions(&b));
}

#[test]
fn queue_pairs_alice_and_bob_and_expires_a_lone_entrant() {
    let start = Instant::now();
    let mut queue = MatchmakingQueue::new(Duration::from_secs(30), Duration::from_secs(60));

    let alice = QueuedPlayer::new(Uuid::new_v4(), "Alice", None, start);
    let bob = QueuedPlayer::new(Uuid::new_v4(), "Bob", None, start);
    queue.enqueue(alice);
    queue.enqueue(bob);

    let (first, second) = queue.try_match().unwrap();
    assert_eq!((first.name.as_str(), second.name.as_str()), ("Alice", "Bob"));
    assert!(queue.is_empty());
    assert!(queue.try_match().is_none());

    let carol = QueuedPlayer::new(Uuid::new_v4(), "Carol", None, start);
    let carol_id = carol.player_id;
    queue.enqueue(carol);

    let scan = queue.scan_timeouts(start + Duration::from_secs(31));
    assert_eq!(scan.notify.len(), 1);
    assert!(scan.expired.is_empty());

    let scan = queue.scan_timeouts(start + Duration::from_secs(91));
    assert_eq!(scan.expired.len(), 1);
    assert_eq!(scan.expired[0].player_id, carol_id);
    assert_eq!(queue.position(carol_id), None);
}
