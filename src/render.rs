//! Human-readable rendering of a plan report.

use std::fmt::Write;

use crate::assembler::OutputRecord;
use crate::pipeline::PlanReport;
use crate::request::DateFlexibility;

fn hours(minutes: u32) -> String {
    format!("{}h{:02}m", minutes / 60, minutes % 60)
}

fn route(report: &PlanReport) -> String {
    let request = &report.request;
    let mut places: Vec<String> = vec![request.origins.to_string()];
    places.extend(request.destinations.iter().map(|d| d.to_string()));
    format!("{} ({})", places.join(" -> "), request.topology)
}

fn dates(report: &PlanReport) -> String {
    match &report.request.dates {
        DateFlexibility::Window { earliest, latest } if earliest == latest => earliest.to_string(),
        DateFlexibility::Window { earliest, latest } => format!("{} to {}", earliest, latest),
        DateFlexibility::Fuzzy { trip_days, season } => format!("{} days, {:?}", trip_days, season),
    }
}

fn option(out: &mut String, record: &OutputRecord) -> std::fmt::Result {
    writeln!(
        out,
        "#{} {:.2} {}  score {:.2}  {}  {} stop(s)  risk {:.1}  PTO {} day(s)",
        record.rank,
        record.total_cost,
        record.currency,
        record.score,
        hours(record.total_duration_minutes),
        record.total_stops,
        record.risk_score,
        record.pto_days,
    )?;
    writeln!(out, "   airlines: {}", record.airlines.join(", "))?;
    let dates: Vec<String> = record.leg_dates.iter().map(|d| d.to_string()).collect();
    writeln!(out, "   travel dates: {}", dates.join(", "))?;
    for leg in &record.legs {
        writeln!(out, "   {} {} -> {} ({})", leg.date, leg.origin, leg.destination, hours(leg.duration_minutes))?;
        for segment in &leg.segments {
            writeln!(
                out,
                "     {:<8} {} {} -> {} {}",
                segment.flight_number,
                segment.departure_airport,
                segment.departure_time,
                segment.arrival_airport,
                segment.arrival_time,
            )?;
        }
        for layover in &leg.layovers {
            writeln!(
                out,
                "     layover {} {}{}",
                layover.airport,
                hours(layover.duration_minutes),
                if layover.overnight { " overnight" } else { "" },
            )?;
        }
    }
    for flag in &record.visa_flags {
        writeln!(out, "   visa: {} ({:?}) {}", flag.airport, flag.purpose, flag.note)?;
    }
    Ok(())
}

/// Render a report for a terminal.
pub fn render_text(report: &PlanReport) -> String {
    let mut out = String::new();
    // Writing into a String cannot fail.
    let _ = write_report(&mut out, report);
    out
}

fn write_report(out: &mut String, report: &PlanReport) -> std::fmt::Result {
    writeln!(out, "Route: {}", route(report))?;
    writeln!(out, "Dates: {}", dates(report))?;
    writeln!(out, "Currency: {}", report.request.currency)?;
    if let Some((lo, hi)) = report.stats.price_range {
        writeln!(out, "Price range: {:.2} - {:.2}", lo, hi)?;
    }
    writeln!(
        out,
        "Searched {} strategies ({} live calls, {} cache hits, {} skipped by budget)",
        report.stats.strategies_generated,
        report.stats.live_calls,
        report.stats.cache_hits,
        report.stats.strategies_skipped,
    )?;
    writeln!(out)?;

    for record in &report.records {
        option(out, record)?;
        writeln!(out)?;
    }

    if let Some(explanation) = report.explanation.as_deref().filter(|e| !e.is_empty()) {
        writeln!(out, "{}", explanation)?;
    }
    Ok(())
}
