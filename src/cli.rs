// Copyright (c) 2025 Taxlot Developers.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use clap::{arg, value_parser, ArgAction, Command};

fn period_args(cmd: Command) -> Command {
    cmd.arg(arg!(--year <YEAR> "Fiscal year, e.g. 2024").required(false))
        .arg(arg!(--ytd "Current calendar year to date").action(ArgAction::SetTrue))
        .arg(arg!(--json "Print as JSON").action(ArgAction::SetTrue))
}

pub fn build_cli() -> Command {
    Command::new("taxlot")
        .about("FIFO lot accounting, realized/unrealized gains, and dividend tax reporting")
        .subcommand_required(false)
        .subcommand(Command::new("init").about("Initialize the database"))
        .subcommand(
            Command::new("tx")
                .about("Manage raw brokerage transactions")
                .subcommand_required(true)
                .subcommand(
                    Command::new("add")
                        .about("Record one transaction")
                        .arg(arg!(--date <DATE> "YYYY-MM-DD").required(true))
                        .arg(arg!(--type <TYPE> "Trade | 'Money Movement' | 'Receive Deliver'").required(true))
                        .arg(arg!(--"sub-type" <SUBTYPE> "e.g. Dividend, Assignment").required(false))
                        .arg(arg!(--symbol <SYMBOL>).required(false))
                        .arg(arg!(--action <ACTION> "BUY_TO_OPEN | SELL_TO_CLOSE | SELL_TO_OPEN | BUY_TO_CLOSE").required(false))
                        .arg(arg!(--quantity <QTY>).required(false))
                        .arg(arg!(--price <PRICE> "Average fill price").required(false))
                        .arg(arg!(--total <TOTAL> "Signed USD cash effect").required(false))
                        .arg(arg!(--fees <FEES>).required(false))
                        .arg(arg!(--commissions <COMMISSIONS>).required(false))
                        .arg(arg!(--category <CATEGORY> "Stock | Option | ETF").required(false)),
                )
                .subcommand(
                    Command::new("list")
                        .about("List transactions")
                        .arg(arg!(--symbol <SYMBOL>).required(false))
                        .arg(arg!(--year <YEAR>).required(false).value_parser(value_parser!(i32)))
                        .arg(arg!(--json "Print as JSON").action(ArgAction::SetTrue))
                        .arg(arg!(--jsonl "Print as JSON lines").action(ArgAction::SetTrue)),
                ),
        )
        .subcommand(
            Command::new("import")
                .about("Import data from files")
                .subcommand_required(true)
                .subcommand(
                    Command::new("transactions")
                        .about("Import a broker transaction CSV")
                        .arg(arg!(<path> "CSV file path")),
                ),
        )
        .subcommand(
            Command::new("export")
                .about("Export data to files")
                .subcommand_required(true)
                .subcommand(
                    Command::new("transactions")
                        .about("Export all transactions as CSV")
                        .arg(arg!(<path> "Destination CSV path")),
                ),
        )
        .subcommand(
            Command::new("rates")
                .about("Manage the historical USD/EUR rate table")
                .subcommand_required(true)
                .subcommand(
                    Command::new("import")
                        .about("Import a Bundesbank 'date;rate' file")
                        .arg(arg!(<path> "Rates file path")),
                )
                .subcommand(
                    Command::new("fetch")
                        .about("Fetch daily EUR/USD reference rates (Frankfurter/ECB)")
                        .arg(
                            arg!(--days <DAYS> "How many days back")
                                .required(false)
                                .value_parser(value_parser!(usize)),
                        ),
                )
                .subcommand(Command::new("list").about("Show the most recent stored rates"))
                .subcommand(
                    Command::new("convert")
                        .about("Convert a USD amount to EUR at a date's rate")
                        .arg(arg!(--date <DATE> "YYYY-MM-DD").required(true))
                        .arg(arg!(--amount <AMOUNT> "USD amount").required(true)),
                ),
        )
        .subcommand(
            Command::new("prices")
                .about("Manage market prices")
                .subcommand_required(true)
                .subcommand(Command::new("fetch").about("Fetch current quotes for all traded symbols"))
                .subcommand(Command::new("list").about("Show recently stored prices"))
                .subcommand(
                    Command::new("set-key")
                        .about("Store the Finnhub API key")
                        .arg(arg!(<key> "API key")),
                ),
        )
        .subcommand(
            Command::new("tax")
                .about("Tax reports for a fiscal year or YTD")
                .subcommand_required(true)
                .subcommand(period_args(
                    Command::new("realized").about("Realized gains/losses by category"),
                ))
                .subcommand(period_args(
                    Command::new("dividends").about("Dividend income and source tax"),
                ))
                .subcommand(period_args(Command::new("fees").about("Fee and commission totals")))
                .subcommand(period_args(
                    Command::new("summary").about("Realized + dividends + fees in one view"),
                )),
        )
        .subcommand(
            Command::new("portfolio")
                .about("Open positions")
                .subcommand_required(true)
                .subcommand(
                    Command::new("positions")
                        .about("Unrealized gains/losses for current holdings")
                        .arg(arg!(--live "Fetch fresh market prices").action(ArgAction::SetTrue))
                        .arg(arg!(--json "Print as JSON").action(ArgAction::SetTrue)),
                ),
        )
}
