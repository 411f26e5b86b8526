use crate::infra::{build_desk, sample_directory, Desk};
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use clap::Args;
use resource_desk::config::WorkflowConfig;
use resource_desk::error::AppError;
use resource_desk::workflows::approvals::{Approvable, DecisionRequest, Verdict};
use resource_desk::workflows::directory::UserId;
use resource_desk::workflows::email::{EmailApplicationSubmission, ProvisioningCompletion};
use resource_desk::workflows::equipment::{
    AssetTag, EquipmentImporter, EquipmentRegistration, EquipmentType, RegisterEquipmentRequest,
};
use resource_desk::workflows::loans::{
    IssueRequest, IssueUnit, LoanItemRequest, LoanSubmission,
};
use resource_desk::workflows::reports::{
    EmailAccountSummary, EquipmentInventorySummary, LoanReportSummary,
};
use std::path::PathBuf;

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Reporting date (YYYY-MM-DD). Defaults to today.
    #[arg(long, value_parser = crate::infra::parse_date)]
    pub(crate) today: Option<NaiveDate>,
    /// Skip the email provisioning portion of the demo.
    #[arg(long)]
    pub(crate) skip_email: bool,
}

#[derive(Args, Debug)]
pub(crate) struct ImportArgs {
    /// Inventory CSV export to load
    #[arg(long)]
    pub(crate) csv: PathBuf,
    /// Staff member recorded as the importer
    #[arg(long, default_value = "farid")]
    pub(crate) actor: String,
}

fn user(id: &str) -> UserId {
    UserId(id.to_string())
}

fn morning(day: NaiveDate) -> DateTime<Utc> {
    day.and_time(NaiveTime::MIN).and_utc() + Duration::hours(9)
}

/// Signs off every open stage with whichever officer it was assigned to.
fn approve_chain(desk: &Desk, approvable: &Approvable, at: DateTime<Utc>) -> Result<(), AppError> {
    loop {
        let pending = desk
            .approvals()
            .for_application(approvable)?
            .into_iter()
            .find(|approval| approval.is_pending());
        let Some(approval) = pending else {
            return Ok(());
        };
        let outcome = desk.approvals().decide(
            &approval.id,
            DecisionRequest {
                officer_id: approval.officer_id.clone(),
                verdict: Verdict::Approve,
                comments: Some("Supported".to_string()),
                approved_quantities: Vec::new(),
            },
            at,
        )?;
        println!(
            "  {} approved by {} -> {}",
            approval.stage.label(),
            approval.officer_id,
            outcome.application_status
        );
    }
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let today = args.today.unwrap_or_else(|| Utc::now().date_naive());
    let (desk, inbox) = build_desk(sample_directory(), WorkflowConfig::default());

    println!("Resource desk demo ({today})");

    if !args.skip_email {
        demo_email(&desk, today)?;
    }
    demo_loan(&desk, today)?;

    println!("\nNotifications delivered: {}", inbox.delivered().len());
    for staff in ["aina", "siti", "farid"] {
        println!("  {staff}: {} unread", inbox.unread_count(&user(staff)));
    }

    let reports = desk.reports();
    render_equipment(&reports.equipment_inventory()?);
    render_loans(&reports.loans(today)?);
    render_email(&reports.email_accounts()?);
    Ok(())
}

fn demo_email(desk: &Desk, today: NaiveDate) -> Result<(), AppError> {
    println!("\nEmail account application");
    let submitted_at = morning(today - Duration::days(5));
    let application = desk.email().submit_new(
        EmailApplicationSubmission {
            applicant_id: user("aina"),
            purpose: "New staff onboarding".to_string(),
            proposed_email: Some("aina.rahim@agency.gov.my".to_string()),
            supporting_officer_id: user("siti"),
        },
        submitted_at,
    )?;
    println!("  {} submitted ({})", application.id, application.status.label());

    approve_chain(desk, &Approvable::Email(application.id.clone()), submitted_at + Duration::days(1))?;

    let provisioner = user("rahman");
    let provisioned_at = submitted_at + Duration::days(2);
    desk.email()
        .start_provisioning(&application.id, &provisioner, provisioned_at)?;
    let completed = desk.email().complete_provisioning(
        &application.id,
        ProvisioningCompletion {
            actor_id: provisioner,
            assigned_email: "aina.rahim@agency.gov.my".to_string(),
            assigned_user_id: Some("aina.rahim".to_string()),
        },
        provisioned_at,
    )?;
    println!(
        "  provisioned {} ({})",
        completed.final_assigned_email.as_deref().unwrap_or("-"),
        completed.status.label()
    );
    Ok(())
}

fn demo_loan(desk: &Desk, today: NaiveDate) -> Result<(), AppError> {
    println!("\nICT equipment loan");
    let store_officer = user("farid");
    let stocked_at = morning(today - Duration::days(14));
    for (tag, kind) in [
        ("ICT-LPT-001", EquipmentType::Laptop),
        ("ICT-LPT-002", EquipmentType::Laptop),
        ("ICT-PRJ-001", EquipmentType::Projector),
    ] {
        desk.inventory().register(
            RegisterEquipmentRequest {
                actor_id: store_officer.clone(),
                registration: EquipmentRegistration {
                    asset_tag: AssetTag(tag.to_string()),
                    equipment_type: kind,
                    brand: None,
                    model: None,
                    serial_number: None,
                    location: Some("ICT Store".to_string()),
                    department: None,
                },
            },
            stocked_at,
        )?;
    }

    let submitted_at = morning(today - Duration::days(12));
    let loan = desk.loans().submit_new(
        LoanSubmission {
            applicant_id: user("aina"),
            responsible_officer_id: None,
            supporting_officer_id: user("siti"),
            purpose: "Budget roadshow".to_string(),
            location: "Dewan Utama".to_string(),
            loan_start_date: today - Duration::days(10),
            loan_end_date: today - Duration::days(3),
            items: vec![
                LoanItemRequest {
                    equipment_type: EquipmentType::Laptop,
                    quantity: 1,
                    notes: None,
                },
                LoanItemRequest {
                    equipment_type: EquipmentType::Projector,
                    quantity: 1,
                    notes: Some("With HDMI cable".to_string()),
                },
            ],
        },
        submitted_at,
    )?;
    println!("  {} submitted ({})", loan.id, loan.status.label());

    approve_chain(desk, &Approvable::Loan(loan.id.clone()), submitted_at + Duration::days(1))?;

    let issued = desk.loans().issue(
        &loan.id,
        IssueRequest {
            actor_id: store_officer,
            receiving_officer_id: None,
            due_date: None,
            notes: None,
            units: vec![
                IssueUnit {
                    line: 1,
                    asset_tag: AssetTag("ICT-LPT-001".to_string()),
                    accessories: vec!["Charger".to_string()],
                },
                IssueUnit {
                    line: 2,
                    asset_tag: AssetTag("ICT-PRJ-001".to_string()),
                    accessories: vec!["HDMI cable".to_string()],
                },
            ],
        },
        morning(today - Duration::days(10)),
    )?;
    println!(
        "  issued {} unit(s) ({})",
        issued.transactions.len(),
        issued.application.status.label()
    );

    let sweep = desk.loans().sweep_overdue(today, morning(today))?;
    println!(
        "  overdue sweep flagged {} transaction(s) on {} loan(s)",
        sweep.transactions_flagged,
        sweep.loans_flagged.len()
    );
    Ok(())
}

pub(crate) fn run_import(args: ImportArgs) -> Result<(), AppError> {
    let (desk, _) = build_desk(sample_directory(), WorkflowConfig::default());
    let batch = EquipmentImporter::from_path(&args.csv)?;
    let summary = desk
        .inventory()
        .import(batch, &user(&args.actor), Utc::now())?;

    println!("Inventory import: {}", args.csv.display());
    println!("  imported {} unit(s)", summary.imported.len());
    if summary.skipped.is_empty() {
        println!("  skipped: none");
    } else {
        println!("  skipped:");
        for row in &summary.skipped {
            let tag = if row.asset_tag.is_empty() { "-" } else { &row.asset_tag };
            println!("    row {} ({}): {}", row.row, tag, row.reason);
        }
    }

    render_equipment(&desk.reports().equipment_inventory()?);
    Ok(())
}

fn render_equipment(summary: &EquipmentInventorySummary) {
    println!("\nEquipment inventory ({} units)", summary.total);
    for entry in &summary.by_availability {
        println!("- {}: {}", entry.status, entry.count);
    }
    for entry in &summary.by_type {
        println!(
            "  {}: {} total | {} available | {} on loan",
            entry.type_label, entry.total, entry.available, entry.on_loan
        );
    }
    println!("Utilisation: {:.1}%", summary.utilisation_pct);
}

fn render_loans(summary: &LoanReportSummary) {
    println!("\nLoan applications ({})", summary.total);
    for entry in summary.by_status.iter().filter(|entry| entry.count > 0) {
        println!("- {}: {}", entry.status, entry.count);
    }
    println!("Open transactions: {}", summary.open_transactions);
    if summary.overdue.is_empty() {
        println!("Overdue: none");
    } else {
        println!("Overdue");
        for row in &summary.overdue {
            println!(
                "- {} held by {} (due {}, {} day(s) late)",
                row.asset_tag, row.holder_name, row.due_date, row.days_overdue
            );
        }
    }
}

fn render_email(summary: &EmailAccountSummary) {
    println!("\nEmail applications ({})", summary.total);
    for entry in summary.by_status.iter().filter(|entry| entry.count > 0) {
        println!("- {}: {}", entry.status, entry.count);
    }
    for account in &summary.provisioned {
        println!("  {} -> {}", account.applicant_name, account.final_assigned_email);
    }
}
