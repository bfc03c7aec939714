//! Customer-facing copy, Arabic first with an English mirror.
//!
//! Every string the bot sends comes from here so wording changes never
//! touch flow logic. Operator cards are Arabic only; the ops channel runs
//! in Arabic regardless of what the customer picked.

use rust_decimal::Decimal;
use sofra_core::{Cart, CustomerId, DraftOrder, Language, NewOrder, OrderId};

pub fn money(language: Language, amount: Decimal) -> String {
    match language {
        Language::Ar => format!("{amount} د.أ"),
        Language::En => format!("JOD {amount}"),
    }
}

// ---------------------------------------------------------------------------
// Language and main menu

pub fn language_prompt_body() -> String {
    "أهلاً بك في سُفرة 🍽️\nWelcome to Sofra\n\nاختر لغتك · Choose your language".to_string()
}

pub fn language_button_ar() -> &'static str {
    "العربية"
}

pub fn language_button_en() -> &'static str {
    "English"
}

pub fn welcome_body(language: Language) -> String {
    match language {
        Language::Ar => "يا هلا! شو بتحب تعمل اليوم؟".to_string(),
        Language::En => "Great! What would you like to do today?".to_string(),
    }
}

pub fn main_menu_body(language: Language) -> String {
    match language {
        Language::Ar => "كيف بقدر أساعدك؟".to_string(),
        Language::En => "How can I help you?".to_string(),
    }
}

pub fn btn_order_food(language: Language) -> &'static str {
    match language {
        Language::Ar => "اطلب أكل 🍔",
        Language::En => "Order food 🍔",
    }
}

pub fn btn_view_cart(language: Language) -> &'static str {
    match language {
        Language::Ar => "سلتي 🛒",
        Language::En => "My cart 🛒",
    }
}

pub fn btn_support(language: Language) -> &'static str {
    match language {
        Language::Ar => "مساعدة",
        Language::En => "Support",
    }
}

pub fn btn_main_menu(language: Language) -> &'static str {
    match language {
        Language::Ar => "القائمة الرئيسية",
        Language::En => "Main menu",
    }
}

pub fn btn_checkout(language: Language) -> &'static str {
    match language {
        Language::Ar => "أكّد الطلب ✅",
        Language::En => "Checkout ✅",
    }
}

pub fn btn_edit_cart(language: Language) -> &'static str {
    match language {
        Language::Ar => "عدّل السلة",
        Language::En => "Edit cart",
    }
}

pub fn btn_continue(language: Language) -> &'static str {
    match language {
        Language::Ar => "كمّل طلبك",
        Language::En => "Keep shopping",
    }
}

pub fn btn_confirm(language: Language) -> &'static str {
    match language {
        Language::Ar => "تأكيد ✅",
        Language::En => "Confirm ✅",
    }
}

pub fn btn_modify(language: Language) -> &'static str {
    match language {
        Language::Ar => "تعديل",
        Language::En => "Modify",
    }
}

pub fn btn_cancel(language: Language) -> &'static str {
    match language {
        Language::Ar => "إلغاء",
        Language::En => "Cancel",
    }
}

pub fn btn_new_order(language: Language) -> &'static str {
    match language {
        Language::Ar => "اطلب كمان 🍽️",
        Language::En => "Order again 🍽️",
    }
}

pub fn btn_rate_order(language: Language) -> &'static str {
    match language {
        Language::Ar => "قيّم الطلب ⭐",
        Language::En => "Rate order ⭐",
    }
}

pub fn btn_end_support(language: Language) -> &'static str {
    match language {
        Language::Ar => "إنهاء المحادثة",
        Language::En => "End chat",
    }
}

pub fn btn_saved_address(language: Language) -> &'static str {
    match language {
        Language::Ar => "نفس العنوان 📍",
        Language::En => "Same address 📍",
    }
}

// ---------------------------------------------------------------------------
// Browsing

pub fn pick_cuisine_body(language: Language) -> String {
    match language {
        Language::Ar => "شو نفسك تاكل؟ اختر تصنيف أو تصفح كل المطاعم.".to_string(),
        Language::En => "What are you craving? Pick a cuisine or browse everything.".to_string(),
    }
}

pub fn list_open_button(language: Language) -> &'static str {
    match language {
        Language::Ar => "اختر",
        Language::En => "Choose",
    }
}

pub fn cuisine_section(language: Language) -> &'static str {
    match language {
        Language::Ar => "التصنيفات",
        Language::En => "Cuisines",
    }
}

pub fn all_restaurants_row(language: Language) -> &'static str {
    match language {
        Language::Ar => "كل المطاعم",
        Language::En => "All restaurants",
    }
}

pub fn restaurants_body(language: Language) -> String {
    match language {
        Language::Ar => "اختر المطعم يلي بدك تطلب منه:".to_string(),
        Language::En => "Pick the restaurant you want to order from:".to_string(),
    }
}

pub fn keyword_results_body(language: Language, keyword: &str) -> String {
    match language {
        Language::Ar => format!("هاي المطاعم يلي لقيتها عن \"{keyword}\":"),
        Language::En => format!("Here is what I found for \"{keyword}\":"),
    }
}

pub fn which_restaurant_body(language: Language, name: &str) -> String {
    match language {
        Language::Ar => format!("ما لقيت مطعم اسمه \"{name}\" بالظبط، ممكن تقصد واحد من هدول؟"),
        Language::En => format!("I could not find \"{name}\" exactly. Did you mean one of these?"),
    }
}

pub fn restaurants_section(language: Language) -> &'static str {
    match language {
        Language::Ar => "المطاعم",
        Language::En => "Restaurants",
    }
}

pub fn restaurants_empty(language: Language) -> String {
    match language {
        Language::Ar => "ما في مطاعم متوفرة هون حالياً، جرب تصنيف ثاني.".to_string(),
        Language::En => "No restaurants available here right now. Try another cuisine.".to_string(),
    }
}

pub fn delivery_fee_note(language: Language, fee: Decimal) -> String {
    match language {
        Language::Ar => format!("توصيل: {}", money(language, fee)),
        Language::En => format!("Delivery: {}", money(language, fee)),
    }
}

pub fn menu_body(language: Language, restaurant_name: &str) -> String {
    match language {
        Language::Ar => format!("منيو {restaurant_name} — اختر قسم:"),
        Language::En => format!("{restaurant_name} menu. Pick a section:"),
    }
}

pub fn menu_section(language: Language) -> &'static str {
    match language {
        Language::Ar => "الأقسام",
        Language::En => "Sections",
    }
}

pub fn items_body(language: Language, restaurant_name: &str) -> String {
    match language {
        Language::Ar => format!("شو بتحب تطلب من {restaurant_name}؟"),
        Language::En => format!("What would you like from {restaurant_name}?"),
    }
}

pub fn items_section(language: Language) -> &'static str {
    match language {
        Language::Ar => "الأصناف",
        Language::En => "Items",
    }
}

pub fn price_from(language: Language, price: Decimal) -> String {
    match language {
        Language::Ar => format!("من {}", money(language, price)),
        Language::En => format!("from {}", money(language, price)),
    }
}

pub fn nav_prev(language: Language) -> &'static str {
    match language {
        Language::Ar => "⬅️ السابق",
        Language::En => "⬅️ Previous",
    }
}

pub fn nav_next(language: Language) -> &'static str {
    match language {
        Language::Ar => "التالي ➡️",
        Language::En => "Next ➡️",
    }
}

pub fn page_label(language: Language, page: usize) -> String {
    match language {
        Language::Ar => format!("صفحة {}", page + 1),
        Language::En => format!("Page {}", page + 1),
    }
}

pub fn no_more_pages(language: Language) -> String {
    match language {
        Language::Ar => "ما في صفحات زيادة.".to_string(),
        Language::En => "No more pages.".to_string(),
    }
}

pub fn item_caption(language: Language, name: &str, description: Option<&str>) -> String {
    let mut caption = format!("*{name}*");
    if let Some(description) = description {
        if !description.trim().is_empty() {
            caption.push('\n');
            caption.push_str(description.trim());
        }
    }
    match language {
        Language::Ar => caption.push_str("\n\nأي حجم بتحب؟"),
        Language::En => caption.push_str("\n\nWhich size would you like?"),
    }
    caption
}

pub fn quantity_body(language: Language, item_name: &str) -> String {
    match language {
        Language::Ar => format!("كم واحدة من {item_name}؟ اختر أو اكتب الرقم."),
        Language::En => format!("How many of {item_name}? Tap or type a number."),
    }
}

pub fn quantity_range(language: Language, max: u32) -> String {
    match language {
        Language::Ar => format!("الكمية لازم تكون بين 1 و {max}."),
        Language::En => format!("Quantity has to be between 1 and {max}."),
    }
}

pub fn unavailable_item(language: Language) -> String {
    match language {
        Language::Ar => "هالصنف مش متوفر حالياً للأسف 😔".to_string(),
        Language::En => "That item is not available right now, sorry 😔".to_string(),
    }
}

pub fn stale_choice_body(language: Language) -> String {
    match language {
        Language::Ar => "هاي القائمة صار إلها فترة، رجعناك على القائمة الرئيسية.".to_string(),
        Language::En => "That menu is out of date, taking you back to the main menu.".to_string(),
    }
}

// ---------------------------------------------------------------------------
// Cart

pub fn added_to_cart(language: Language, quantity: u32, name: &str) -> String {
    match language {
        Language::Ar => format!("تمام، أضفت {quantity} × {name} 👌"),
        Language::En => format!("Done, added {quantity} × {name} 👌"),
    }
}

pub fn line_updated(language: Language, quantity: u32, name: &str) -> String {
    match language {
        Language::Ar => format!("عدلتها، صارت {quantity} × {name} ✅"),
        Language::En => format!("Updated, now {quantity} × {name} ✅"),
    }
}

pub fn removed_from_cart(language: Language, name: &str) -> String {
    match language {
        Language::Ar => format!("شلت {name} من السلة."),
        Language::En => format!("Removed {name} from your cart."),
    }
}

pub fn cart_summary(language: Language, cart: &Cart) -> String {
    let mut body = match language {
        Language::Ar => "🛒 سلتك:\n".to_string(),
        Language::En => "🛒 Your cart:\n".to_string(),
    };
    for (index, line) in cart.lines().iter().enumerate() {
        body.push_str(&format!(
            "{}. {} × {} — {}\n",
            index + 1,
            line.quantity,
            line.display_name,
            money(language, line.line_total()),
        ));
    }
    match language {
        Language::Ar => body.push_str(&format!("\nالمجموع: {}", money(language, cart.total()))),
        Language::En => body.push_str(&format!("\nSubtotal: {}", money(language, cart.total()))),
    }
    body
}

pub fn cart_empty(language: Language) -> String {
    match language {
        Language::Ar => "سلتك فاضية، يلا نعبّيها 😄".to_string(),
        Language::En => "Your cart is empty. Let's fix that 😄".to_string(),
    }
}

pub fn cart_cleared(language: Language) -> String {
    match language {
        Language::Ar => "فضّيت السلة.".to_string(),
        Language::En => "Cart cleared.".to_string(),
    }
}

pub fn cart_section(language: Language) -> &'static str {
    match language {
        Language::Ar => "السلة",
        Language::En => "Cart",
    }
}

pub fn actions_section(language: Language) -> &'static str {
    match language {
        Language::Ar => "خيارات",
        Language::En => "Options",
    }
}

pub fn edit_cart_body(language: Language) -> String {
    match language {
        Language::Ar => "شو بدك تعدّل؟".to_string(),
        Language::En => "What would you like to change?".to_string(),
    }
}

pub fn edit_more(language: Language) -> &'static str {
    match language {
        Language::Ar => "➕ زيادة",
        Language::En => "➕ One more",
    }
}

pub fn edit_less(language: Language) -> &'static str {
    match language {
        Language::Ar => "➖ تقليل",
        Language::En => "➖ One less",
    }
}

pub fn edit_remove(language: Language) -> &'static str {
    match language {
        Language::Ar => "🗑️ حذف",
        Language::En => "🗑️ Remove",
    }
}

pub fn edit_remove_row(language: Language) -> &'static str {
    match language {
        Language::Ar => "اضغط للحذف",
        Language::En => "Tap to remove",
    }
}

pub fn edit_clear_row(language: Language) -> &'static str {
    match language {
        Language::Ar => "تفريغ السلة",
        Language::En => "Clear the cart",
    }
}

pub fn line_missing(language: Language) -> String {
    match language {
        Language::Ar => "هالسطر مش موجود بالسلة، يمكن انحذف قبل.".to_string(),
        Language::En => "That line is no longer in your cart.".to_string(),
    }
}

// ---------------------------------------------------------------------------
// Checkout

pub fn checkout_location_body(language: Language) -> String {
    match language {
        Language::Ar => "وين نوصّل طلبك؟ 📍\nابعت موقعك من واتساب أو اكتب العنوان.".to_string(),
        Language::En => {
            "Where should we deliver? 📍\nShare your WhatsApp location or type the address."
                .to_string()
        }
    }
}

pub fn checkout_saved_address_body(language: Language, address: &str) -> String {
    match language {
        Language::Ar => format!(
            "وين نوصّل طلبك؟ 📍\nعنوانك المحفوظ: {address}\nابعت موقع جديد، اكتب عنوان، أو اختر نفس العنوان."
        ),
        Language::En => format!(
            "Where should we deliver? 📍\nSaved address: {address}\nShare a new location, type an address, or keep the same one."
        ),
    }
}

pub fn checkout_name_body(language: Language) -> String {
    match language {
        Language::Ar => "شو الاسم يلي نكتبه على الطلب؟".to_string(),
        Language::En => "What name should we put on the order?".to_string(),
    }
}

pub fn confirm_summary(language: Language, restaurant_name: &str, draft: &DraftOrder) -> String {
    let mut body = match language {
        Language::Ar => format!("📋 طلبك من {restaurant_name}:\n"),
        Language::En => format!("📋 Your order from {restaurant_name}:\n"),
    };
    for line in draft.cart_snapshot.lines() {
        body.push_str(&format!(
            "• {} × {} — {}\n",
            line.quantity,
            line.display_name,
            money(language, line.line_total()),
        ));
    }
    match language {
        Language::Ar => body.push_str(&format!(
            "\nالمجموع: {}\nالتوصيل: {}\nالإجمالي: {}\n\nالاسم: {}\nالعنوان: {}\n\nنأكّد الطلب؟",
            money(language, draft.subtotal()),
            money(language, draft.delivery_fee),
            money(language, draft.total()),
            draft.customer_name,
            draft.address.as_text(),
        )),
        Language::En => body.push_str(&format!(
            "\nSubtotal: {}\nDelivery: {}\nTotal: {}\n\nName: {}\nAddress: {}\n\nConfirm the order?",
            money(language, draft.subtotal()),
            money(language, draft.delivery_fee),
            money(language, draft.total()),
            draft.customer_name,
            draft.address.as_text(),
        )),
    }
    body
}

pub fn order_placed(language: Language, order_id: OrderId) -> String {
    match language {
        Language::Ar => format!("تم! 🎉 رقم طلبك #{} ووصلناه للمطعم، بنبلشوا فيه هلق.", order_id.0),
        Language::En => {
            format!("Done! 🎉 Order #{} is with the restaurant and being prepared.", order_id.0)
        }
    }
}

pub fn order_points(language: Language, points: i64, balance: Option<i64>) -> String {
    match (language, balance) {
        (Language::Ar, Some(balance)) => {
            format!("كسبت {points} نقطة، رصيدك صار {balance} نقطة ⭐")
        }
        (Language::Ar, None) => format!("كسبت {points} نقطة ⭐"),
        (Language::En, Some(balance)) => {
            format!("You earned {points} points, balance {balance} ⭐")
        }
        (Language::En, None) => format!("You earned {points} points ⭐"),
    }
}

pub fn favorite_nudge(language: Language, name: &str) -> String {
    match language {
        Language::Ar => format!("عالفكرة، {name} من مطاعمك المفضلة، جربه المرة الجاي 😉"),
        Language::En => format!("By the way, {name} is one of your favorites. Try it next time 😉"),
    }
}

pub fn order_already_placed(language: Language, order_id: OrderId) -> String {
    match language {
        Language::Ar => format!("طلبك #{} مأكّد من قبل وماشي عندنا، ما في داعي تأكّد مرة ثانية 👍", order_id.0),
        Language::En => {
            format!("Order #{} is already confirmed and on its way, no need to confirm again 👍", order_id.0)
        }
    }
}

pub fn order_cancelled(language: Language) -> String {
    match language {
        Language::Ar => "ألغينا الطلب وفضّينا السلة. إذا غيّرت رأيك إحنا هون 🙏".to_string(),
        Language::En => "Order cancelled and cart cleared. We are here if you change your mind 🙏".to_string(),
    }
}

pub fn empty_cart_checkout(language: Language) -> String {
    match language {
        Language::Ar => "سلتك فاضية، ضيف شي الأول وبعدين منأكّد الطلب.".to_string(),
        Language::En => "Your cart is empty. Add something first, then we can check out.".to_string(),
    }
}

pub fn confirm_hint(language: Language) -> String {
    match language {
        Language::Ar => "اضغط تأكيد إذا كل شي تمام، أو تعديل لترجع على السلة.".to_string(),
        Language::En => "Tap Confirm if everything looks right, or Modify to go back to the cart.".to_string(),
    }
}

// ---------------------------------------------------------------------------
// Free-text fallbacks

pub fn didnt_understand(language: Language) -> String {
    match language {
        Language::Ar => "ما فهمت عليك، ممكن تعيدها بطريقة ثانية؟ أو اكتب \"منيو\" لتشوف المطاعم.".to_string(),
        Language::En => "I did not catch that. Try saying it differently, or type \"menu\" to browse.".to_string(),
    }
}

pub fn slow_down(language: Language) -> String {
    match language {
        Language::Ar => "شوي شوي عليّ 😅 استنى لحظة وجرب كمان مرة.".to_string(),
        Language::En => "Easy on me 😅 give it a moment and try again.".to_string(),
    }
}

pub fn service_trouble(language: Language) -> String {
    match language {
        Language::Ar => "صار عندي خلل مؤقت، جرب كمان مرة بعد شوي 🙏".to_string(),
        Language::En => "Something went wrong on my side. Please try again shortly 🙏".to_string(),
    }
}

pub fn unsupported_kind(language: Language) -> String {
    match language {
        Language::Ar => "بعتذر، بقدر أقرأ رسائل نصية وأزرار وموقع بس 🙏".to_string(),
        Language::En => "Sorry, I can only read text, buttons, and locations 🙏".to_string(),
    }
}

pub fn location_out_of_context(language: Language) -> String {
    match language {
        Language::Ar => "وصلني موقعك 📍 بس بنحتاجه وقت تأكيد الطلب. نبلش نطلب؟".to_string(),
        Language::En => "Got your location 📍 but I only need it at checkout. Shall we start an order?".to_string(),
    }
}

pub fn did_you_mean(language: Language, name: &str) -> String {
    match language {
        Language::Ar => format!("ما لقيت \"{name}\" بالظبط، قصدك واحد من هدول؟"),
        Language::En => format!("I could not find \"{name}\" exactly. Did you mean one of these?"),
    }
}

pub fn not_found(language: Language, name: &str) -> String {
    match language {
        Language::Ar => format!("ما لقيت \"{name}\" بأي منيو عنا للأسف."),
        Language::En => format!("I could not find \"{name}\" on any of our menus, sorry."),
    }
}

pub fn upsell(language: Language, suggestion: &str) -> String {
    match language {
        Language::Ar => format!("بتحب تضيف {suggestion} كمان؟"),
        Language::En => format!("Would you like to add {suggestion} too?"),
    }
}

pub fn smalltalk_fallback(language: Language) -> String {
    match language {
        Language::Ar => "يا هلا فيك! جاهزين ناخد طلبك 😄".to_string(),
        Language::En => "Hey there! Ready to take your order 😄".to_string(),
    }
}

// ---------------------------------------------------------------------------
// Support and reviews

pub fn support_intro(language: Language) -> String {
    match language {
        Language::Ar => "وصّلناك مع فريق الدعم 🎧 اكتب مشكلتك وبنرد عليك بأقرب وقت.".to_string(),
        Language::En => "You are now with our support team 🎧 Describe the issue and we will get back to you.".to_string(),
    }
}

pub fn support_ack(language: Language) -> String {
    match language {
        Language::Ar => "وصلت رسالتك للفريق ✅".to_string(),
        Language::En => "Your message reached the team ✅".to_string(),
    }
}

pub fn support_closed(language: Language) -> String {
    match language {
        Language::Ar => "سكّرنا محادثة الدعم. إذا احتجت شي ثاني إحنا هون!".to_string(),
        Language::En => "Support chat closed. We are here if you need anything else!".to_string(),
    }
}

pub fn review_prompt(language: Language, order_id: OrderId) -> String {
    match language {
        Language::Ar => format!("اكتب رأيك بالطلب #{} وبوصّله للمطعم 🌟", order_id.0),
        Language::En => format!("Tell us what you thought of order #{} and we will pass it on 🌟", order_id.0),
    }
}

pub fn review_thanks(language: Language) -> String {
    match language {
        Language::Ar => "شكراً على تقييمك! بيفرق معنا كثير 🙏".to_string(),
        Language::En => "Thanks for the feedback! It really helps 🙏".to_string(),
    }
}

// ---------------------------------------------------------------------------
// Operator cards

pub fn operator_order_card(order_id: OrderId, restaurant_name: &str, order: &NewOrder) -> String {
    let mut card = format!(
        "🧾 طلب جديد #{}\nالمطعم: {}\nالزبون: {} ({})\n",
        order_id.0,
        restaurant_name,
        order.customer_name,
        order.customer_id.as_str(),
    );
    for line in &order.lines {
        card.push_str(&format!("• {} × {} — {} د.أ\n", line.quantity, line.description, line.line_total));
    }
    card.push_str(&format!(
        "المجموع: {} د.أ\nالتوصيل: {} د.أ\nالإجمالي: {} د.أ\nالعنوان: {}",
        order.subtotal,
        order.delivery_fee,
        order.total,
        order.address.as_text(),
    ));
    if let Some((lat, lng)) = order.address.coordinates() {
        card.push_str(&format!("\nhttps://maps.google.com/?q={lat},{lng}"));
    }
    card
}

pub fn operator_support_card(customer_id: &CustomerId, profile_name: Option<&str>, text: &str) -> String {
    match profile_name {
        Some(name) => format!("🎧 رسالة دعم من {} ({}):\n{}", name, customer_id.as_str(), text),
        None => format!("🎧 رسالة دعم من {}:\n{}", customer_id.as_str(), text),
    }
}

pub fn operator_review_card(order_id: OrderId, customer_id: &CustomerId, text: &str) -> String {
    format!("⭐ تقييم للطلب #{} من {}:\n{}", order_id.0, customer_id.as_str(), text)
}
