use anyhow::Context;
use clap::Parser;
use drafter_core::ServerConfig;
use drafter_engine::{ClientServer, Download, Page, Redirect, State};
use drafter_render::{
    Content,
    components::{Button, Header, Link, Table, TextBox, bold},
};
use drafter_server::Args;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Bank {
    balance: i64,
    transactions: Vec<Transaction>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Transaction {
    kind: String,
    amount: i64,
}

fn index(State(bank): State<Bank>) -> Page {
    let content: Vec<Content> = vec![
        Header::new("Bank").into(),
        Content::from("Your balance is "),
        bold(bank.balance.to_string()).into(),
        Button::new("Deposit", "deposit").into(),
        Button::new("Withdraw", "withdraw").into(),
        Link::new("Statement", "statement").into(),
    ];
    Page::new(bank, content)
}

fn deposit(State(bank): State<Bank>) -> Page {
    Page::new(
        bank,
        vec![
            Content::from("How much would you like to deposit?"),
            TextBox::new("amount").with_kind("number").with_default(0).into(),
            Button::new("Finish", "finish_deposit").into(),
            Link::new("Back", "index").into(),
        ],
    )
}

fn finish_deposit(State(mut bank): State<Bank>, amount: i64) -> Redirect {
    bank.balance += amount;
    bank.transactions.push(Transaction {
        kind: "deposit".into(),
        amount,
    });
    Redirect::new("index").with_payload(index(State(bank)))
}

fn withdraw(State(bank): State<Bank>) -> Page {
    Page::new(
        bank,
        vec![
            Content::from("How much would you like to withdraw?"),
            TextBox::new("amount").with_kind("number").with_default(0).into(),
            Button::new("Finish", "finish_withdraw").into(),
            Link::new("Back", "index").into(),
        ],
    )
}

fn finish_withdraw(State(mut bank): State<Bank>, amount: i64) -> anyhow::Result<Redirect> {
    if amount > bank.balance {
        anyhow::bail!("cannot withdraw {amount}, the balance is only {}", bank.balance);
    }
    bank.balance -= amount;
    bank.transactions.push(Transaction {
        kind: "withdraw".into(),
        amount,
    });
    Ok(Redirect::new("index").with_payload(index(State(bank))))
}

fn statement(State(bank): State<Bank>) -> anyhow::Result<Page> {
    let table = Table::from_records(&bank.transactions).context("tabulating transactions")?;
    Ok(Page::new(
        bank,
        vec![
            Header::with_level("Statement", 2).into(),
            Content::from(table),
            Button::new("Download", "download_statement").into(),
            Link::new("Back", "index").into(),
        ],
    ))
}

fn download_statement(State(bank): State<Bank>) -> Download {
    let mut csv = String::from("kind,amount\n");
    for transaction in &bank.transactions {
        csv.push_str(&format!("{},{}\n", transaction.kind, transaction.amount));
    }
    Download::new("statement.csv", csv)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let mut config = ServerConfig {
        title: "Bank".into(),
        ..ServerConfig::default()
    };
    args.apply(&mut config);

    let mut server = ClientServer::new(config);
    server.add_route("index", &[], index)?;
    server.add_route("deposit", &[], deposit)?;
    server.add_route("finish_deposit", &["amount"], finish_deposit)?;
    server.add_route("withdraw", &[], withdraw)?;
    server.add_route("finish_withdraw", &["amount"], finish_withdraw)?;
    server.add_route("statement", &[], statement)?;
    server.add_route("download_statement", &[], download_statement)?;
    server
        .start(&Bank {
            balance: 100,
            transactions: Vec::new(),
        })
        .context("failed to start the bank")?;

    tracing::info!("registered {} routes", server.router().len());

    drafter_server::run(server, args.bind).await
}
