// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use clap::{Arg, ArgAction, Command, command, value_parser};

fn opt(id: &'static str, value: &'static str, help: &'static str) -> Arg {
    Arg::new(id).long(id).value_name(value).help(help)
}

fn req(id: &'static str, value: &'static str, help: &'static str) -> Arg {
    opt(id, value, help).required(true)
}

fn pos(id: &'static str, help: &'static str) -> Arg {
    Arg::new(id).required(true).help(help)
}

fn flag(id: &'static str, help: &'static str) -> Arg {
    Arg::new(id).long(id).action(ArgAction::SetTrue).help(help)
}

fn json_args(cmd: Command) -> Command {
    cmd.arg(flag("json", "Print as pretty JSON"))
        .arg(flag("jsonl", "Print as JSON lines"))
}

fn period() -> Arg {
    opt("period", "YYYY-MM", "Ledger month (defaults to the current month)")
}

fn policy_fields(cmd: Command) -> Command {
    cmd.arg(opt("region", "REGION", "Region code"))
        .arg(opt("accrual", "DAYS", "Days accrued per month"))
        .arg(opt("quota", "DAYS", "Annual quota").value_parser(value_parser!(i64)))
        .arg(
            opt("carry-forward", "BOOL", "Roll unused days into the next month")
                .value_parser(value_parser!(bool)),
        )
        .arg(opt("max-carry", "DAYS", "Carry-forward ceiling").value_parser(value_parser!(i64)))
        .arg(
            opt("doc-after", "DAYS", "Documentation required beyond this many days")
                .value_parser(value_parser!(i64)),
        )
}

fn user_cmd() -> Command {
    Command::new("user")
        .about("Manage users and roles")
        .subcommand_required(true)
        .subcommand(
            Command::new("add")
                .arg(pos("email", "Login email"))
                .arg(Arg::new("role").default_value("EMPLOYEE").help("Role")),
        )
        .subcommand(json_args(Command::new("list")))
        .subcommand(
            Command::new("set-role")
                .arg(pos("email", "Login email"))
                .arg(pos("role", "New role")),
        )
}

fn employee_cmd() -> Command {
    Command::new("employee")
        .about("Employee records and compensation")
        .subcommand_required(true)
        .subcommand(
            Command::new("add")
                .arg(req("first", "NAME", "First name"))
                .arg(req("last", "NAME", "Last name"))
                .arg(req("email", "EMAIL", "Work email"))
                .arg(opt("department", "DEPT", "Department"))
                .arg(opt("designation", "TITLE", "Designation"))
                .arg(opt("location", "LOCATION", "Location"))
                .arg(opt("status", "STATUS", "Employment status (default Active)"))
                .arg(opt("hire-date", "YYYY-MM-DD", "Hire date (default today)"))
                .arg(opt("birthdate", "YYYY-MM-DD", "Birth date"))
                .arg(opt("manager", "CODE", "Manager employee code")),
        )
        .subcommand(json_args(Command::new("list")))
        .subcommand(json_args(Command::new("show").arg(pos("code", "Employee code"))))
        .subcommand(json_args(Command::new("me")))
        .subcommand(
            Command::new("update")
                .arg(pos("code", "Employee code"))
                .arg(opt("first", "NAME", "First name"))
                .arg(opt("last", "NAME", "Last name"))
                .arg(opt("department", "DEPT", "Department"))
                .arg(opt("designation", "TITLE", "Designation"))
                .arg(opt("location", "LOCATION", "Location"))
                .arg(opt("birthdate", "YYYY-MM-DD", "Birth date"))
                .arg(opt("manager", "CODE", "Manager employee code")),
        )
        .subcommand(
            Command::new("status")
                .arg(pos("code", "Employee code"))
                .arg(pos("status", "New status"))
                .arg(opt("termination-date", "YYYY-MM-DD", "Last working day")),
        )
        .subcommand(
            Command::new("compensation")
                .arg(pos("code", "Employee code"))
                .arg(req("salary", "AMOUNT", "Base salary"))
                .arg(opt("currency", "CCY", "Currency (defaults to payroll currency)")),
        )
        .subcommand(Command::new("remove").arg(pos("code", "Employee code")))
}

fn leave_cmd() -> Command {
    Command::new("leave")
        .about("Leave policies, balances and requests")
        .subcommand_required(true)
        .subcommand(
            Command::new("policy")
                .subcommand_required(true)
                .subcommand(policy_fields(Command::new("create").arg(pos("name", "Policy name"))))
                .subcommand(json_args(Command::new("list")))
                .subcommand(policy_fields(Command::new("update").arg(pos("name", "Policy name"))))
                .subcommand(Command::new("delete").arg(pos("name", "Policy name"))),
        )
        .subcommand(
            Command::new("assign")
                .arg(req("employee", "CODE", "Employee code"))
                .arg(req("policy", "NAME", "Leave policy"))
                .arg(req("days", "DAYS", "Days allotted"))
                .arg(period()),
        )
        .subcommand(
            Command::new("adjust")
                .arg(req("employee", "CODE", "Employee code"))
                .arg(req("policy", "NAME", "Leave policy"))
                .arg(req("delta", "DAYS", "Signed adjustment").allow_hyphen_values(true))
                .arg(period()),
        )
        .subcommand(Command::new("accrue").arg(period()))
        .subcommand(json_args(
            Command::new("balances")
                .arg(period())
                .arg(opt("policy", "NAME", "Leave policy"))
                .arg(opt("employee", "CODE", "Employee code"))
                .arg(flag("mine", "Only my balances")),
        ))
        .subcommand(
            Command::new("request")
                .arg(req("policy", "NAME", "Leave policy"))
                .arg(req("start", "YYYY-MM-DD", "First day"))
                .arg(opt("end", "YYYY-MM-DD", "Last day (defaults to start)"))
                .arg(opt("days", "DAYS", "Days requested"))
                .arg(flag("half-day", "Half-day request"))
                .arg(opt("reason", "TEXT", "Reason"))
                .arg(period()),
        )
        .subcommand(Command::new("cancel").arg(pos("id", "Request id")))
        .subcommand(
            Command::new("approve")
                .arg(pos("id", "Request id"))
                .arg(period()),
        )
        .subcommand(Command::new("reject").arg(pos("id", "Request id")))
        .subcommand(json_args(
            Command::new("requests")
                .arg(opt("status", "STATUS", "PENDING, APPROVED, REJECTED or CANCELLED"))
                .arg(flag("mine", "Only my requests")),
        ))
        .subcommand(json_args(Command::new("carry-forward").arg(period())))
}

fn payroll_cmd() -> Command {
    let amounts = [
        ("basic", "Basic pay"),
        ("hra", "House rent allowance"),
        ("conveyance", "Conveyance allowance"),
        ("medical", "Medical allowance"),
        ("bonus", "Bonus"),
        ("other", "Other earnings"),
        ("leave-deduction", "Loss-of-pay deduction"),
        ("professional-tax", "Professional tax"),
        ("other-deductions", "Other deductions"),
    ];
    let mut generate = Command::new("generate")
        .arg(req("employee", "CODE", "Employee code"))
        .arg(req("run", "ID", "Payroll run id"))
        .arg(opt("currency", "CCY", "Payslip currency"))
        .arg(flag("include-charges", "Fold approved convenience charges into earnings"));
    for (id, help) in amounts {
        generate = generate.arg(opt(id, "AMOUNT", help));
    }

    Command::new("payroll")
        .about("Payroll runs and payslips")
        .subcommand_required(true)
        .subcommand(
            Command::new("run")
                .subcommand_required(true)
                .subcommand(
                    Command::new("start")
                        .arg(req("start", "YYYY-MM-DD", "Period start"))
                        .arg(req("end", "YYYY-MM-DD", "Period end"))
                        .arg(req("pay-date", "YYYY-MM-DD", "Pay date")),
                )
                .subcommand(Command::new("ensure"))
                .subcommand(json_args(Command::new("list")))
                .subcommand(json_args(Command::new("show").arg(pos("id", "Run id"))))
                .subcommand(Command::new("publish").arg(pos("id", "Run id")))
                .subcommand(Command::new("delete").arg(pos("id", "Run id"))),
        )
        .subcommand(generate)
        .subcommand(json_args(
            Command::new("payslips")
                .arg(opt("run", "ID", "Payroll run id"))
                .arg(opt("employee", "CODE", "Employee code")),
        ))
        .subcommand(json_args(Command::new("payslip").arg(pos("id", "Payslip id"))))
        .subcommand(json_args(Command::new("my")))
        .subcommand(json_args(Command::new("my-current")))
        .subcommand(Command::new("delete-payslip").arg(pos("id", "Payslip id")))
}

fn insurance_cmd() -> Command {
    let financial = |cmd: Command| {
        cmd.arg(opt("bonus-percent", "PCT", "Bonus percent"))
            .arg(opt("e-cash", "AMOUNT", "E-cash amount"))
            .arg(opt("convenience-fee", "AMOUNT", "Convenience fee"))
    };
    Command::new("insurance")
        .about("Employee insurance policies")
        .subcommand_required(true)
        .subcommand(financial(
            Command::new("add")
                .arg(req("employee", "CODE", "Employee code"))
                .arg(req("policy-number", "NUMBER", "Policy number"))
                .arg(req("provider", "NAME", "Provider"))
                .arg(req("start", "YYYY-MM-DD", "Cover start"))
                .arg(req("end", "YYYY-MM-DD", "Cover end"))
                .arg(req("coverage", "AMOUNT", "Coverage amount"))
                .arg(opt("ctc-file-url", "URL", "CTC document link")),
        ))
        .subcommand(json_args(
            Command::new("list")
                .arg(opt("employee", "CODE", "Employee code"))
                .arg(flag("mine", "Only my policies")),
        ))
        .subcommand(json_args(Command::new("show").arg(pos("id", "Insurance id"))))
        .subcommand(
            Command::new("update")
                .arg(pos("id", "Insurance id"))
                .arg(opt("policy-number", "NUMBER", "Policy number"))
                .arg(opt("provider", "NAME", "Provider"))
                .arg(opt("start", "YYYY-MM-DD", "Cover start"))
                .arg(opt("end", "YYYY-MM-DD", "Cover end"))
                .arg(opt("coverage", "AMOUNT", "Coverage amount"))
                .arg(opt("ctc-file-url", "URL", "CTC document link")),
        )
        .subcommand(financial(Command::new("financial").arg(pos("id", "Insurance id"))))
        .subcommand(
            Command::new("ecash")
                .arg(pos("id", "Insurance id"))
                .arg(req("amount", "AMOUNT", "E-cash claimed")),
        )
        .subcommand(Command::new("remove").arg(pos("id", "Insurance id")))
}

fn convenience_cmd() -> Command {
    let decide = |name: &'static str| {
        json_args(
            Command::new(name)
                .arg(pos("ids", "Charge id or comma-separated ids"))
                .arg(opt("reason", "TEXT", "Rejection reason")),
        )
    };
    Command::new("convenience")
        .about("Convenience charge reimbursements")
        .subcommand_required(true)
        .subcommand(
            Command::new("add")
                .arg(req("title", "TEXT", "What was paid for"))
                .arg(req("amount", "AMOUNT", "Amount"))
                .arg(req("date", "YYYY-MM-DD", "Date of expense"))
                .arg(opt("employee", "CODE", "File on behalf of (ADMIN/HR)")),
        )
        .subcommand(json_args(
            Command::new("list")
                .arg(opt("status", "STATUS", "PENDING, APPROVED or REJECTED"))
                .arg(opt("employee", "CODE", "Employee code"))
                .arg(flag("mine", "Only my charges")),
        ))
        .subcommand(json_args(Command::new("pending")))
        .subcommand(json_args(Command::new("show").arg(pos("id", "Charge id"))))
        .subcommand(
            Command::new("update")
                .arg(pos("id", "Charge id"))
                .arg(opt("title", "TEXT", "Title"))
                .arg(opt("amount", "AMOUNT", "Amount"))
                .arg(opt("date", "YYYY-MM-DD", "Date of expense")),
        )
        .subcommand(Command::new("delete").arg(pos("id", "Charge id")))
        .subcommand(decide("approve"))
        .subcommand(decide("reject"))
}

fn audit_cmd() -> Command {
    Command::new("audit")
        .about("Query the audit log")
        .subcommand_required(true)
        .subcommand(json_args(
            Command::new("list")
                .arg(opt("employee", "CODE", "Employee code"))
                .arg(opt("module", "MODULE", "Module, e.g. PAYROLL"))
                .arg(opt("action", "ACTION", "Action, e.g. UPDATE"))
                .arg(opt("entity-type", "TYPE", "Entity type"))
                .arg(opt("from", "YYYY-MM-DD", "From date"))
                .arg(opt("to", "YYYY-MM-DD", "To date"))
                .arg(opt("limit", "N", "Maximum rows").value_parser(value_parser!(usize)))
                .arg(opt("skip", "N", "Rows to skip").value_parser(value_parser!(usize))),
        ))
        .subcommand(json_args(Command::new("trail").arg(pos("entity", "Entity id"))))
}

pub fn build_cli() -> Command {
    command!()
        .name("payclip")
        .about("HR and payroll administration over a local SQLite database")
        .arg(opt("user", "EMAIL", "Act as this user (defaults to the local administrator)").global(true))
        .arg(opt("config", "FILE", "Configuration file").global(true))
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .action(ArgAction::SetTrue)
                .global(true)
                .help("Debug logging"),
        )
        .arg(
            Arg::new("quiet")
                .short('q')
                .long("quiet")
                .action(ArgAction::SetTrue)
                .global(true)
                .conflicts_with("verbose")
                .help("Errors only"),
        )
        .arg(flag("json-errors", "Report failures as a JSON envelope").global(true))
        .subcommand(Command::new("init").about("Create the database"))
        .subcommand(user_cmd())
        .subcommand(employee_cmd())
        .subcommand(leave_cmd())
        .subcommand(payroll_cmd())
        .subcommand(insurance_cmd())
        .subcommand(convenience_cmd())
        .subcommand(audit_cmd())
        .subcommand(json_args(
            Command::new("dashboard")
                .about("Headline figures")
                .arg(flag("mine", "My own figures")),
        ))
        .subcommand(json_args(Command::new("doctor").about("Check stored data for inconsistencies")))
        .subcommand(
            Command::new("export").about("Export data").subcommand_required(true).subcommand(
                Command::new("payslips")
                    .arg(req("run", "ID", "Payroll run id"))
                    .arg(req("format", "FORMAT", "csv or json"))
                    .arg(req("out", "PATH", "Output file")),
            ),
        )
        .subcommand(
            Command::new("import")
                .about("Import CSV files")
                .subcommand_required(true)
                .subcommand(Command::new("employees").arg(pos("path", "CSV file")))
                .subcommand(
                    Command::new("charges")
                        .arg(pos("path", "CSV file"))
                        .arg(opt("employee", "CODE", "File on behalf of (ADMIN/HR)")),
                ),
        )
}
