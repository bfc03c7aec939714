//! Cart screens: the summary view and the line-by-line edit list.

use sofra_chat::{ListPrompt, OutboundMessage};
use sofra_core::{
    ApplicationError, CartKey, ChoiceId, ConversationState, ItemId, Session, VariantId,
};

use crate::handlers::{cart_actions, main_menu};
use crate::replies;
use crate::router::ConversationRouter;

/// Edit list shows per-line +/-/remove groups up to this many lines; bigger
/// carts fall back to one remove row per line so everything stays under the
/// transport row cap.
const FULL_CONTROLS_LINES: usize = 3;

impl ConversationRouter {
    pub(crate) fn show_cart(&self, session: &mut Session) -> Vec<OutboundMessage> {
        let language = session.language;
        if session.cart.is_empty() {
            session.state = ConversationState::MainMenu;
            return vec![main_menu(language, replies::cart_empty(language))];
        }

        session.state = ConversationState::ViewingCart;
        vec![cart_actions(language, replies::cart_summary(language, &session.cart))]
    }

    pub(crate) fn show_cart_editor(&self, session: &mut Session) -> Vec<OutboundMessage> {
        let language = session.language;
        if session.cart.is_empty() {
            session.state = ConversationState::MainMenu;
            return vec![main_menu(language, replies::cart_empty(language))];
        }

        let lines = session.cart.lines().to_vec();
        let mut prompt =
            ListPrompt::new(replies::edit_cart_body(language), replies::list_open_button(language));

        if lines.len() <= FULL_CONTROLS_LINES {
            for line in &lines {
                let key = line.key();
                let title = format!("{} × {}", line.quantity, line.display_name);
                prompt = prompt.section(title, |rows| {
                    rows.row(edit_id(EditAction::Increment, &key), replies::edit_more(language))
                        .row(edit_id(EditAction::Decrement, &key), replies::edit_less(language))
                        .row(edit_id(EditAction::Remove, &key), replies::edit_remove(language));
                });
            }
        } else {
            prompt = prompt.section(replies::cart_section(language), |rows| {
                for line in lines.iter().take(9) {
                    rows.row_with_description(
                        edit_id(EditAction::Remove, &line.key()),
                        format!("{} × {}", line.quantity, line.display_name),
                        replies::edit_remove_row(language),
                    );
                }
            });
        }
        prompt = prompt.section(replies::actions_section(language), |rows| {
            rows.row(ChoiceId::CartClear.as_id(), replies::edit_clear_row(language));
        });

        session.state = ConversationState::EditingCart;
        vec![prompt.build()]
    }

    /// Applies one edit-list action and re-renders the summary.
    pub(crate) fn apply_cart_edit(
        &self,
        session: &mut Session,
        action: EditAction,
        item_id: ItemId,
        variant_id: Option<VariantId>,
    ) -> Result<Vec<OutboundMessage>, ApplicationError> {
        let language = session.language;
        let key = CartKey { item_id, variant_id };
        let touched = match action {
            EditAction::Increment => session.cart.increment(&key),
            EditAction::Decrement => session.cart.decrement(&key),
            EditAction::Remove => session.cart.remove(&key),
        };
        if !touched {
            return Ok(vec![OutboundMessage::text(replies::line_missing(language))]);
        }
        if session.last_added == Some(key) && session.cart.get(&key).is_none() {
            session.last_added = None;
        }
        Ok(self.show_cart(session))
    }

    pub(crate) fn clear_cart(&self, session: &mut Session) -> Vec<OutboundMessage> {
        let language = session.language;
        session.cart.clear();
        session.last_added = None;
        session.state = ConversationState::MainMenu;
        vec![main_menu(language, replies::cart_cleared(language))]
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum EditAction {
    Increment,
    Decrement,
    Remove,
}

fn edit_id(action: EditAction, key: &CartKey) -> String {
    let choice = match action {
        EditAction::Increment => {
            ChoiceId::CartIncrement { item_id: key.item_id, variant_id: key.variant_id }
        }
        EditAction::Decrement => {
            ChoiceId::CartDecrement { item_id: key.item_id, variant_id: key.variant_id }
        }
        EditAction::Remove => {
            ChoiceId::CartRemove { item_id: key.item_id, variant_id: key.variant_id }
        }
    };
    choice.as_id()
}
