//! WebAssembly bindings for the Okey engine.
//!
//! This module exposes a hot-seat controller to JavaScript through
//! wasm-bindgen. A browser client renders from the JSON getters and feeds
//! intents back in; peer snapshots go through `applySnapshot`.

#[cfg(feature = "wasm")]
use wasm_bindgen::prelude::*;

#[cfg(feature = "wasm")]
use crate::actions::Intent;
#[cfg(feature = "wasm")]
use crate::board::GameBoard;
#[cfg(feature = "wasm")]
use crate::game::GameController;

/// Initialize panic hook for better error messages in browser console
#[cfg(feature = "wasm")]
#[wasm_bindgen(start)]
pub fn init() {
    console_error_panic_hook::set_once();
}

/// WASM-exposed session wrapper
#[cfg(feature = "wasm")]
#[wasm_bindgen]
pub struct WasmGame {
    controller: GameController,
}

#[cfg(feature = "wasm")]
#[wasm_bindgen]
impl WasmGame {
    /// Deal a new game. `seed` makes the deal reproducible across peers.
    #[wasm_bindgen(constructor)]
    pub fn new(player_names_json: &str, seed: u64) -> Result<WasmGame, JsValue> {
        let player_names: Vec<String> = serde_json::from_str(player_names_json)
            .map_err(|e| JsValue::from_str(&format!("Invalid player names: {}", e)))?;

        let board = GameBoard::with_names(player_names, seed)
            .map_err(|e| JsValue::from_str(&e.to_string()))?;

        Ok(WasmGame {
            controller: GameController::new(board),
        })
    }

    /// Current state as snapshot JSON
    #[wasm_bindgen(js_name = getState)]
    pub fn get_state(&self) -> String {
        serde_json::to_string(&self.controller.snapshot()).unwrap_or_else(|_| "{}".to_string())
    }

    #[wasm_bindgen(js_name = getCurrentPlayer)]
    pub fn get_current_player(&self) -> usize {
        self.controller.board().current_player_index()
    }

    /// A seat's rack as JSON, including tile ids for stable rendering
    #[wasm_bindgen(js_name = getRack)]
    pub fn get_rack(&self, seat: usize) -> String {
        match self.controller.board().player(seat) {
            Some(player) => {
                let rack: Vec<serde_json::Value> = player
                    .rack
                    .iter()
                    .map(|t| {
                        serde_json::json!({
                            "id": t.id.0,
                            "number": t.number,
                            "color": t.color,
                            "isJoker": t.is_joker,
                        })
                    })
                    .collect();
                serde_json::to_string(&rack).unwrap_or_else(|_| "[]".to_string())
            }
            None => "null".to_string(),
        }
    }

    /// Apply an intent from JSON, returns the event JSON or the error message
    #[wasm_bindgen(js_name = applyIntent)]
    pub fn apply_intent(&mut self, intent_json: &str) -> Result<String, JsValue> {
        let intent: Intent = serde_json::from_str(intent_json)
            .map_err(|e| JsValue::from_str(&format!("Invalid intent JSON: {}", e)))?;

        match self.controller.apply_intent(intent) {
            Ok(event) => Ok(serde_json::to_string(&event).unwrap_or_else(|_| "null".to_string())),
            Err(e) => Err(JsValue::from_str(&e.to_string())),
        }
    }

    /// Apply snapshot JSON received from a peer
    #[wasm_bindgen(js_name = applySnapshot)]
    pub fn apply_snapshot(&mut self, snapshot_json: &str) -> Result<(), JsValue> {
        self.controller
            .receive_snapshot(snapshot_json.as_bytes())
            .map(|_| ())
            .map_err(|e| JsValue::from_str(&e.to_string()))
    }

    #[wasm_bindgen(js_name = isGameOver)]
    pub fn is_game_over(&self) -> bool {
        self.controller.is_game_over()
    }

    /// Seat of the first player with an empty rack
    #[wasm_bindgen(js_name = getWinner)]
    pub fn get_winner(&self) -> Option<usize> {
        let winner = self.controller.check_for_winner()?;
        self.controller
            .board()
            .players()
            .iter()
            .position(|p| p.id == winner.id)
    }

    #[wasm_bindgen(js_name = getPer)]
    pub fn get_per(&self) -> u32 {
        self.controller.per()
    }

    #[wasm_bindgen(js_name = getIndicator)]
    pub fn get_indicator(&self) -> String {
        serde_json::to_string(&self.controller.indicator_tile()).unwrap_or_else(|_| "null".to_string())
    }

    #[wasm_bindgen(js_name = getOkey)]
    pub fn get_okey(&self) -> String {
        serde_json::to_string(&self.controller.okey_tile()).unwrap_or_else(|_| "null".to_string())
    }

    #[wasm_bindgen(js_name = getStatusMessage)]
    pub fn get_status_message(&self) -> Option<String> {
        self.controller.status_message().map(str::to_string)
    }

    #[wasm_bindgen(js_name = toggleIndicator)]
    pub fn toggle_indicator(&mut self) -> bool {
        self.controller.toggle_indicator();
        self.controller.show_indicator()
    }
}
