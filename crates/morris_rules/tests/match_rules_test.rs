//! Scenario tests for the match state machine, driven through legal play.

use morris_rules::{
    Action, FinishReason, InvariantSet, LegalCapture, Match, MatchStatus, MorrisInvariants,
    PIECES_PER_PLAYER, Phase, Position, RuleViolation, SubState, Symbol, Transition,
};
use Position::*;

fn active() -> Match {
    let mut game = Match::new(1, "ana");
    game.join("bo").expect("join failed");
    game
}

fn play(game: &mut Match, positions: &[Position]) {
    for pos in positions {
        game.place_piece(*pos)
            .unwrap_or_else(|e| panic!("placing {pos} failed: {e}"));
    }
}

/// 18 placements with no mill for either side; both can move afterwards.
const QUIET_PLACEMENT: [Position; 18] = [
    D3, C3, B2, A1, E4, D2, A4, F4, G1, B4, A7, E3, F2, B6, D5, D1, C5, D6,
];

/// A complete game: X builds mills on the left and middle files, O drops to
/// three pieces and flies, and X's last capture leaves O with two.
fn won_by_attrition() -> Vec<Action> {
    use Action::*;
    vec![
        Place { position: E3 },
        Place { position: B4 },
        Place { position: G7 },
        Place { position: F2 },
        Place { position: A4 },
        Place { position: D2 },
        Place { position: E4 },
        Place { position: C4 },
        Place { position: E5 },
        Capture { position: D2 },
        Place { position: D3 },
        Place { position: D6 },
        Place { position: D2 },
        Place { position: A1 },
        Place { position: B6 },
        Place { position: A7 },
        Capture { position: B6 },
        Place { position: G1 },
        Place { position: D7 },
        Capture { position: D2 },
        Place { position: B2 },
        Move { from: E5, to: D5 },
        Capture { position: D3 },
        Move { from: C4, to: C3 },
        Move { from: D5, to: E5 },
        Capture { position: F2 },
        Move { from: B2, to: D2 },
        Move { from: E5, to: D5 },
        Capture { position: B4 },
        Move { from: C3, to: F6 },
        Move { from: D5, to: E5 },
        Capture { position: F6 },
    ]
}

#[test]
fn test_top_row_mill_keeps_turn() {
    let mut game = active();
    play(&mut game, &[A1, B2, D1, D2]);

    let result = game.place_piece(G1).expect("third piece failed");
    assert_eq!(result, Transition::MillFormed);
    assert!(game.board().forms_mill(G1, Symbol::X));
    assert_eq!(game.sub_state(), SubState::AwaitingCapture);
    assert_eq!(game.current(), Symbol::X);
}

#[test]
fn test_capture_during_placement_is_not_attrition() {
    let mut game = active();
    play(&mut game, &[A1, B2, D1, D2, G1]);

    let result = game.capture_opponent_piece(B2).expect("capture failed");
    assert_eq!(
        result,
        Transition::TurnPassed {
            next: Symbol::O,
            phase_changed: false
        }
    );
    let o = game.player(Symbol::O).expect("second seat");
    assert_eq!(o.pieces_on_board(), 1);
    assert_eq!(o.pieces_placed(), 2);
    assert_eq!(game.status(), MatchStatus::Active);
}

#[test]
fn test_capture_rejects_own_piece_and_empty_point() {
    let mut game = active();
    play(&mut game, &[A1, B2, D1, D2, G1]);
    let before = game.clone();

    assert_eq!(
        game.capture_opponent_piece(A1),
        Err(RuleViolation::NotOpponentPiece(A1))
    );
    assert_eq!(
        game.capture_opponent_piece(G7),
        Err(RuleViolation::NotOpponentPiece(G7))
    );
    assert_eq!(game, before);
}

#[test]
fn test_full_placement_enters_movement() {
    let mut game = active();
    play(&mut game, &QUIET_PLACEMENT[..17]);
    assert_eq!(game.phase(), Phase::Placement);

    let last = game.place_piece(QUIET_PLACEMENT[17]).expect("last placement failed");
    assert_eq!(
        last,
        Transition::TurnPassed {
            next: Symbol::X,
            phase_changed: true
        }
    );
    assert_eq!(game.phase(), Phase::Movement);
    for player in game.players() {
        assert_eq!(player.pieces_placed(), PIECES_PER_PLAYER);
        assert_eq!(player.pieces_in_hand(), 0);
    }

    assert_eq!(
        game.place_piece(C4),
        Err(RuleViolation::WrongPhase(Phase::Movement))
    );
    assert_eq!(
        game.move_piece(G1, G7),
        Err(RuleViolation::NotAdjacent { from: G1, to: G7 })
    );
    assert!(game.move_piece(G1, G4).is_ok());
    assert_eq!(game.current(), Symbol::O);
}

#[test]
fn test_rejected_commands_leave_state_untouched() {
    let mut game = active();
    play(&mut game, &QUIET_PLACEMENT);
    let before = game.clone();

    for action in [
        Action::Place { position: C4 },
        Action::Move { from: B4, to: C4 },
        Action::Move { from: D3, to: D2 },
        Action::Capture { position: B4 },
    ] {
        assert!(game.apply(action).is_err(), "{action} should be rejected");
        assert_eq!(game, before, "{action} changed the match");
    }
}

#[test]
fn test_snapshot_is_stable_between_commands() {
    let mut game = active();
    play(&mut game, &[A1, B2]);
    let first = serde_json::to_string(&game).expect("serialize");
    let second = serde_json::to_string(&game).expect("serialize");
    assert_eq!(first, second);

    let restored: Match = serde_json::from_str(&first).expect("deserialize");
    assert_eq!(restored, game);
}

/// Picks the first legal action in board order, if the match is still live.
fn first_legal_action(game: &Match) -> Option<Action> {
    let me = game.current();
    let board = game.board();
    match (game.sub_state(), game.phase()) {
        (SubState::Finished, _) => None,
        (SubState::AwaitingCapture, _) => board
            .positions_of(me.opponent())
            .into_iter()
            .find(|pos| LegalCapture::check(*pos, game).is_ok())
            .map(|position| Action::Capture { position }),
        (SubState::InProgress, Phase::Placement) => board
            .free_positions()
            .first()
            .map(|&position| Action::Place { position }),
        (SubState::InProgress, Phase::Movement) => {
            board.positions_of(me).into_iter().find_map(|from| {
                board
                    .legal_destinations(from, game.can_fly(me))
                    .first()
                    .map(|&to| Action::Move { from, to })
            })
        }
    }
}

#[test]
fn test_counters_hold_through_self_play() {
    let mut game = active();
    let mut placed = [0u8; 2];

    for _ in 0..400 {
        let Some(action) = first_legal_action(&game) else {
            break;
        };
        game.apply(action)
            .unwrap_or_else(|e| panic!("{action} rejected: {e}"));

        for (slot, symbol) in [Symbol::X, Symbol::O].into_iter().enumerate() {
            let player = game.player(symbol).expect("seat");
            assert!(player.pieces_placed() >= placed[slot], "placed decreased");
            assert!(player.pieces_placed() <= PIECES_PER_PLAYER);
            placed[slot] = player.pieces_placed();

            let captures_against = game
                .history()
                .iter()
                .filter(|ply| {
                    ply.player == symbol.opponent()
                        && matches!(ply.action, Action::Capture { .. })
                })
                .count();
            assert_eq!(
                usize::from(player.pieces_on_board()),
                usize::from(player.pieces_placed()) - captures_against
            );
        }
        assert!(MorrisInvariants::check_all(&game).is_ok());
    }
}

#[test]
fn test_finished_match_accepts_nothing() {
    let mut game = active();
    game.forfeit(Symbol::O).expect("forfeit failed");
    let outcome = game.outcome().expect("outcome");
    assert_eq!(outcome.winner, Symbol::X);
    assert_eq!(outcome.reason, FinishReason::Forfeit);
    assert!(matches!(
        game.place_piece(A1),
        Err(RuleViolation::WrongStatus { .. })
    ));
}

#[test]
fn test_complete_game_ends_by_attrition() {
    let mut game = active();
    let actions = won_by_attrition();
    let (last, rest) = actions.split_last().expect("non-empty game");

    for action in rest {
        let transition = game
            .apply(*action)
            .unwrap_or_else(|e| panic!("{action} rejected: {e}"));
        assert!(!matches!(transition, Transition::Finished { .. }), "{action} ended the game");
    }
    assert_eq!(game.phase(), Phase::Movement);
    assert!(game.can_fly(Symbol::O));
    assert!(!game.can_fly(Symbol::X));

    assert_eq!(
        game.apply(*last),
        Ok(Transition::Finished {
            winner: Symbol::X,
            reason: FinishReason::Attrition
        })
    );
    assert_eq!(game.winner().map(|p| p.name()), Some("ana"));
    assert_eq!(game.history().len(), actions.len());
    assert_eq!(game.board().count(Symbol::O), 2);
    assert!(game.apply(Action::Move { from: A1, to: B2 }).is_err());
}
