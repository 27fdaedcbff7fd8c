//! Chat commands end to end over an in-memory ledger.

mod common;

use bot::Sent;
use common::{test_bot, test_bot_with_rate_limit, wait_for, FRIEND, OWNER, USER};
use database::Tokens;
use payment_gateway::PaymentStatus;

/// The request id from a rendered lookup header (`feature · query · ID X`).
fn request_id_in(text: &str) -> String {
    let header = text.lines().next().unwrap();
    header.rsplit("ID ").next().unwrap().trim().to_string()
}

#[tokio::test]
async fn balance_for_a_new_user() {
    let bot = test_bot().await;

    bot.say(USER, "/saldo").await.unwrap();

    let text = bot.last(USER);
    assert!(text.contains("Balance: 0 tokens"), "{}", text);
    assert!(text.contains("Lookups so far: 0"), "{}", text);
}

#[tokio::test]
async fn lookup_edits_progress_message_with_result() {
    let bot = test_bot().await;
    bot.credit(USER, 10).await;

    bot.say(USER, "/nama budi santoso").await.unwrap();

    let sent = bot.sender.sent();
    let Sent::Message {
        message_id: progress,
        text: searching,
        ..
    } = &sent[0]
    else {
        panic!("expected a progress message, got {:?}", sent[0]);
    };
    assert_eq!(searching, "Searching nama...");
    let Sent::Edit { message_id, text, .. } = &sent[1] else {
        panic!("expected an edit, got {:?}", sent[1]);
    };
    assert_eq!(message_id, progress);
    assert!(text.contains("nama: BUDI SANTOSO"), "{}", text);
    assert!(text.contains("Charged 3 tokens"), "{}", text);
    assert!(text.ends_with("Balance: 7 tokens"), "{}", text);
    assert_eq!(bot.balance(USER).await, Tokens::whole(7));
}

#[tokio::test]
async fn failed_lookup_reports_refund() {
    let bot = test_bot().await;
    bot.credit(USER, 10).await;

    bot.say(USER, "/nopol B 1234 XYZ").await.unwrap();

    let text = bot.last(USER);
    assert!(text.contains("The data source failed"), "{}", text);
    assert!(text.contains("Refunded 3 tokens"), "{}", text);
    assert!(text.ends_with("Balance: 10 tokens"), "{}", text);
    assert_eq!(bot.balance(USER).await, Tokens::whole(10));
}

#[tokio::test]
async fn lookup_refusals_charge_nothing() {
    let bot = test_bot().await;

    bot.say(USER, "/nama").await.unwrap();
    assert_eq!(bot.last(USER), "Usage: /nama <query>");

    bot.say(USER, "/nama BUDI").await.unwrap();
    assert!(bot.last(USER).contains("Insufficient balance"));

    bot.credit(USER, 10).await;
    bot.say(USER, "/ceknik 12345").await.unwrap();
    assert_eq!(bot.last(USER), "Invalid input: NIK must be exactly 16 digits");

    assert_eq!(bot.balance(USER).await, Tokens::whole(10));
    assert!(!bot
        .sender
        .texts_to(&USER.to_string())
        .iter()
        .any(|t| t.starts_with("Searching ceknik")));
}

#[tokio::test]
async fn saved_results_can_be_reopened() {
    let bot = test_bot().await;
    bot.credit(USER, 10).await;

    bot.say(USER, "/ceknik 3171-2345-6789-0001").await.unwrap();
    let request_id = request_id_in(&bot.last(USER));

    bot.say(USER, "/riwayat").await.unwrap();
    assert!(bot.last(USER).contains(&request_id));

    bot.say(USER, &format!("/getdata {}", request_id.to_lowercase()))
        .await
        .unwrap();
    let text = bot.last(USER);
    assert!(text.contains("Charged 0.5 tokens"), "{}", text);
    assert!(text.ends_with("Balance: 7.5 tokens"), "{}", text);

    bot.say(FRIEND, &format!("/getdata {}", request_id)).await.unwrap();
    assert!(bot.last(FRIEND).contains("not found"));
}

#[tokio::test]
async fn deposit_is_credited_once_payment_arrives() {
    let bot = test_bot().await;

    bot.say(USER, "/deposit 10").await.unwrap();

    let sent = bot.sender.sent();
    let Some(Sent::Photo {
        photo,
        caption,
        buttons,
        ..
    }) = sent.last()
    else {
        panic!("expected payment instructions, got {:?}", sent);
    };
    let order_id = bot.gateway.orders()[0].0.clone();
    assert_eq!(photo, &format!("QR-{}", order_id));
    assert!(caption.contains("Pay: Rp 50.000"), "{}", caption);
    assert!(caption.contains("Expires in"), "{}", caption);
    assert_eq!(buttons[0].data, "check_deposit_1");
    assert_eq!(buttons[1].data, "cancel_deposit_1");

    bot.press(USER, "check_deposit_1").await.unwrap();
    assert!(matches!(
        bot.sender.sent().last(),
        Some(Sent::Callback { text, .. }) if text == "Deposit #1: waiting for payment"
    ));

    bot.gateway.set_status(&order_id, PaymentStatus::Paid);
    let text = wait_for(&bot.sender, &USER.to_string(), "Total credited").await;
    assert!(text.contains("Total credited: 10 tokens"), "{}", text);
    assert_eq!(bot.balance(USER).await, Tokens::whole(10));
}

#[tokio::test]
async fn deposit_without_amount_shows_prices_and_promos() {
    let bot = test_bot().await;
    bot.say(OWNER, "/setpromo add hemat 20").await.unwrap();

    bot.say(USER, "/deposit").await.unwrap();

    let text = bot.last(USER);
    assert!(text.contains("Price: Rp 5.000 per token"), "{}", text);
    assert!(text.contains("Minimum: 10 tokens"), "{}", text);
    assert!(text.contains("HEMAT · +20%"), "{}", text);
}

#[tokio::test]
async fn deposits_can_be_cancelled_by_their_owner_only() {
    let bot = test_bot().await;
    bot.say(USER, "/deposit 10").await.unwrap();

    bot.press(FRIEND, "cancel_deposit_1").await.unwrap();
    assert!(matches!(
        bot.sender.sent().last(),
        Some(Sent::Callback { text, .. }) if text == "This is not your deposit"
    ));

    bot.say(USER, "/cancel 1").await.unwrap();
    assert_eq!(bot.last(USER), "Deposit #1 cancelled.");

    bot.say(USER, "/cancel 1").await.unwrap();
    assert_eq!(bot.last(USER), "Deposit #1 is already rejected or expired.");
}

#[tokio::test]
async fn owner_commands_are_gated() {
    let bot = test_bot().await;

    bot.say(USER, &format!("/addtoken {} 5", USER)).await.unwrap();
    assert!(bot.last(USER).starts_with("Access denied"));
    assert_eq!(bot.balance(USER).await, Tokens::ZERO);

    bot.say(OWNER, &format!("/addtoken {} 5", USER)).await.unwrap();
    assert_eq!(bot.last(OWNER), format!("Done. {} now has 5 tokens.", USER));
    assert!(bot.last(USER).contains("An admin added 5 tokens"));

    bot.say(OWNER, &format!("/reducetoken {} 2.5", USER)).await.unwrap();
    assert_eq!(bot.balance(USER).await, Tokens::from_units(250));

    bot.say(OWNER, &format!("/reducetoken {} 10", USER)).await.unwrap();
    assert!(bot.last(OWNER).contains("Insufficient balance"));
}

#[tokio::test]
async fn owner_approval_credits_and_notifies() {
    let bot = test_bot().await;
    bot.say(USER, "/deposit 10").await.unwrap();

    bot.say(OWNER, "/pending").await.unwrap();
    assert!(bot.last(OWNER).contains("1 pending deposit(s)"));

    bot.say(OWNER, "/approve 1").await.unwrap();
    assert_eq!(
        bot.last(OWNER),
        format!("Approved deposit #1: 10 tokens credited to {}.", USER)
    );
    assert!(bot.last(USER).contains("Total credited: 10 tokens"));

    bot.say(OWNER, "/approve 1").await.unwrap();
    assert_eq!(bot.last(OWNER), "Deposit #1 is already approved.");
    assert_eq!(bot.balance(USER).await, Tokens::whole(10));
}

#[tokio::test]
async fn owner_rejection_notifies_user() {
    let bot = test_bot().await;
    bot.say(USER, "/deposit 10").await.unwrap();

    bot.say(OWNER, "/reject 1").await.unwrap();
    assert_eq!(bot.last(OWNER), "Rejected deposit #1.");
    assert_eq!(bot.last(USER), "Your deposit #1 was rejected.");

    bot.say(OWNER, "/reject 42").await.unwrap();
    assert!(bot.last(OWNER).contains("not found"));
}

#[tokio::test]
async fn prices_and_maintenance_are_adjustable() {
    let bot = test_bot().await;
    bot.credit(USER, 5).await;

    bot.say(OWNER, "/setcost nama 1").await.unwrap();
    assert_eq!(bot.last(OWNER), "/nama now costs 1 tokens.");
    bot.say(USER, "/nama BUDI").await.unwrap();
    assert_eq!(bot.balance(USER).await, Tokens::whole(4));

    bot.say(OWNER, "/setcost bogus 1").await.unwrap();
    assert_eq!(bot.last(OWNER), "Unknown feature: bogus");

    bot.say(OWNER, "/setmt nama on").await.unwrap();
    bot.say(USER, "/nama BUDI").await.unwrap();
    assert!(bot.last(USER).contains("under maintenance"));

    bot.say(OWNER, "/setmt nama off").await.unwrap();
    bot.say(OWNER, "/setmt all on").await.unwrap();
    assert_eq!(bot.last(OWNER), "Global maintenance on.");
    bot.say(USER, "/nama BUDI").await.unwrap();
    assert!(bot.last(USER).contains("under maintenance"));
    assert_eq!(bot.balance(USER).await, Tokens::whole(4));

    bot.say(OWNER, "/setmt nama maybe").await.unwrap();
    assert!(bot.last(OWNER).starts_with("Usage: /setmt"));

    bot.say(OWNER, "/setprice 10000").await.unwrap();
    assert_eq!(bot.last(OWNER), "Token price set to Rp 10.000");
    bot.say(OWNER, "/setdeposit 50000").await.unwrap();
    assert_eq!(bot.last(OWNER), "Minimum deposit set to Rp 50.000 (10 tokens)");
}

#[tokio::test]
async fn promo_administration() {
    let bot = test_bot().await;

    bot.say(OWNER, "/setpromo add bonus50 50 10 2").await.unwrap();
    let text = bot.last(OWNER);
    assert!(text.starts_with("Promo created."), "{}", text);
    assert!(text.contains("BONUS50 · 50% bonus · min 10 tokens"), "{}", text);
    assert!(text.contains("Uses: 0/2"), "{}", text);

    bot.say(OWNER, "/setpromo add bonus50 10").await.unwrap();
    assert!(bot.last(OWNER).contains("already exists"));

    bot.say(OWNER, "/setpromo add x 10").await.unwrap();
    assert!(bot.last(OWNER).starts_with("Invalid input"));

    bot.say(OWNER, "/setpromo list").await.unwrap();
    assert!(bot.last(OWNER).contains("BONUS50 · 50% · min 10 · 0/2 · on"));

    bot.say(OWNER, "/setpromo off bonus50").await.unwrap();
    assert_eq!(bot.last(OWNER), "Promo BONUS50 switched off.");
    bot.say(OWNER, "/setpromo info BONUS50").await.unwrap();
    assert!(bot.last(OWNER).contains("State: inactive"));

    bot.say(OWNER, "/setpromo delete BONUS50").await.unwrap();
    assert_eq!(bot.last(OWNER), "Promo BONUS50 deleted.");
    bot.say(OWNER, "/setpromo info BONUS50").await.unwrap();
    assert_eq!(bot.last(OWNER), "Promo BONUS50 not found.");

    bot.say(OWNER, "/setpromo").await.unwrap();
    assert!(bot.last(OWNER).starts_with("Usage: /setpromo add"));
}

#[tokio::test]
async fn referral_code_applies_once() {
    let bot = test_bot().await;

    bot.say(FRIEND, "/ref").await.unwrap();
    let text = bot.last(FRIEND);
    let code = text
        .lines()
        .next()
        .and_then(|l| l.strip_prefix("Your referral code: "))
        .unwrap()
        .to_string();

    bot.say(USER, &format!("/start ref_{}", code)).await.unwrap();
    assert!(bot.last(USER).starts_with("Referral code applied."));

    bot.say(USER, &format!("/start {}", code)).await.unwrap();
    assert!(bot.last(USER).starts_with("You already have a referrer."));

    bot.say(FRIEND, "/ref").await.unwrap();
    assert!(bot.last(FRIEND).contains("Referred users: 1"));
}

#[tokio::test]
async fn non_owners_are_rate_limited() {
    let bot = test_bot_with_rate_limit(2).await;

    for _ in 0..3 {
        bot.say(USER, "/saldo").await.unwrap();
    }
    assert_eq!(bot.last(USER), "Too many requests. Please wait a moment.");

    for _ in 0..3 {
        bot.say(OWNER, "/saldo").await.unwrap();
    }
    assert!(bot.last(OWNER).starts_with("Balance:"));
}

#[tokio::test]
async fn help_lists_features_and_unknown_commands_are_answered() {
    let bot = test_bot().await;

    bot.say(USER, "/help").await.unwrap();
    let text = bot.last(USER);
    assert!(text.contains("/nama <query> · 3 tokens"), "{}", text);
    assert!(text.contains("/getdata <ID> · re-open a result (0.5 tokens)"), "{}", text);
    assert!(!text.contains("Owner:"));

    bot.say(OWNER, "/menu").await.unwrap();
    assert!(bot.last(OWNER).contains("Owner: /pending"));

    bot.say(USER, "/whatever").await.unwrap();
    assert!(bot.last(USER).starts_with("Unknown command"));

    bot.say(USER, "just chatting").await.unwrap();
    assert_eq!(bot.sender.texts_to(&USER.to_string()).len(), 2);
}
