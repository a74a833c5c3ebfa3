//! # CLI Command Implementations
//!
//! Each command loads the store, runs one core operation, and saves the
//! store back if it changed.

use super::{CollateCommand, Context, DeleteCommand, LinkCommand, QueryCommand, UnlinkCommand};
use crate::config::OutputFormat;
use crate::{render, storage};
use famtree_core::{
    FamilyAttribute, FamilyId, FamtreeError, IndividualAttribute, IndividualId, IntegrityEngine,
    ProjectionBuilder, ProjectionOptions, Query, QueryEngine, QueryResult, RecordStore, Session,
    Sex, StoreMetrics, canonical_checksum, canonical_crypto_hash, collate_ancestors,
    collate_descendants, collate_family_members,
};
use std::path::{Path, PathBuf};

// =============================================================================
// OUTPUT HELPERS
// =============================================================================

fn print_json(value: &impl serde::Serialize) -> Result<(), FamtreeError> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| FamtreeError::SerializationError(e.to_string()))?;
    println!("{text}");
    Ok(())
}

fn label(store: &RecordStore, id: &IndividualId) -> String {
    store
        .individual(id)
        .map(|i| {
            let name = i.display_name();
            if name.is_empty() {
                id.to_string()
            } else {
                format!("{id} {name}")
            }
        })
        .unwrap_or_else(|| id.to_string())
}

fn optional_label(store: &RecordStore, id: Option<&IndividualId>) -> String {
    id.map_or_else(|| "-".to_string(), |id| label(store, id))
}

fn save(ctx: &Context, store: &RecordStore) -> Result<(), FamtreeError> {
    let format = ctx.save_format(storage::stored_format(&ctx.database));
    storage::save_store(store, &ctx.database, format)
}

// =============================================================================
// STORE COMMANDS
// =============================================================================

/// Create an empty store file.
pub fn cmd_init(ctx: &Context, force: bool) -> Result<(), FamtreeError> {
    if ctx.database.exists() && !force {
        return Err(FamtreeError::IoError(
            "Database already exists. Use --force to overwrite.".to_string(),
        ));
    }
    storage::save_store(&RecordStore::new(), &ctx.database, ctx.format)?;
    tracing::info!(path = %ctx.database.display(), format = ?ctx.format, "initialized store");
    println!("Initialized new store at {}", ctx.database.display());
    Ok(())
}

/// Show store metrics.
pub fn cmd_status(ctx: &Context) -> Result<(), FamtreeError> {
    let store = storage::load_store(&ctx.database)?;
    let metrics = StoreMetrics::from_store(&store);

    if ctx.json_mode {
        return print_json(&serde_json::json!({
            "database": ctx.database.to_string_lossy(),
            "metrics": metrics,
        }));
    }

    println!("famtree Store Status");
    println!("====================");
    println!("Database:        {}", ctx.database.display());
    println!();
    println!("Individuals:     {}", metrics.individual_count);
    println!("Families:        {}", metrics.family_count);
    println!("Unions:          {}", metrics.union_count);
    println!("Roots:           {}", metrics.root_count);
    println!("Isolated:        {}", metrics.isolated_count);
    println!("Max Generations: {}", metrics.max_generations);
    Ok(())
}

/// List individuals sorted by surname, forename and id.
pub fn cmd_list(ctx: &Context) -> Result<(), FamtreeError> {
    let store = storage::load_store(&ctx.database)?;
    let mut individuals: Vec<_> = store.individuals().collect();
    individuals.sort_by_key(|i| i.sort_label());

    if ctx.json_mode {
        let rows: Vec<_> = individuals
            .iter()
            .map(|i| {
                serde_json::json!({
                    "id": i.id(),
                    "name": i.display_name(),
                    "sex": i.sex(),
                })
            })
            .collect();
        return print_json(&rows);
    }

    for individual in individuals {
        println!("{}", individual.sort_label());
    }
    Ok(())
}

/// Show one individual with its relationships.
pub fn cmd_show(ctx: &Context, id: &str) -> Result<(), FamtreeError> {
    let store = storage::load_store(&ctx.database)?;
    let id = IndividualId::new(id);
    let individual = store.get_individual(&id)?;
    let query = QueryEngine::new(&store);
    let parents = query.parents(&id);
    let spouses = query.spouses(&id);
    let children = query.children(&id, None);

    if ctx.json_mode {
        return print_json(&serde_json::json!({
            "individual": individual,
            "parents": parents,
            "spouses": spouses,
            "children": children,
        }));
    }

    println!("{}", label(&store, &id));
    if let Some(sex) = individual.sex() {
        println!("  Sex:      {sex}");
    }
    for (tag, event) in [
        ("Born", &individual.birth),
        ("Died", &individual.death),
        ("Buried", &individual.burial),
    ] {
        if let Some(event) = event {
            let date = event.date_label().unwrap_or_default();
            let place = event.place.clone().unwrap_or_default();
            println!("  {tag:<9} {}", [date, place].join(" ").trim());
        }
    }
    println!("  Father:   {}", optional_label(&store, parents.father.as_ref()));
    println!("  Mother:   {}", optional_label(&store, parents.mother.as_ref()));
    for link in &spouses {
        let married = link
            .marriage
            .as_ref()
            .and_then(|d| d.label())
            .map(|d| format!(" (m. {d})"))
            .unwrap_or_default();
        println!(
            "  Spouse:   {}{married}",
            optional_label(&store, link.spouse.as_ref())
        );
    }
    for child in &children {
        println!("  Child:    {}", label(&store, child));
    }
    if let Some(note) = &individual.note {
        println!("  Note:     {note}");
    }
    Ok(())
}

/// Canonical checksum and BLAKE3 digest.
pub fn cmd_hash(ctx: &Context) -> Result<(), FamtreeError> {
    let store = storage::load_store(&ctx.database)?;
    let checksum = canonical_checksum(&store)?;
    let digest = canonical_crypto_hash(&store)?;

    if ctx.json_mode {
        return print_json(&serde_json::json!({
            "checksum": checksum,
            "blake3": digest,
        }));
    }
    println!("Checksum: {checksum:016x}");
    println!("BLAKE3:   {digest}");
    Ok(())
}

// =============================================================================
// EDIT COMMANDS
// =============================================================================

/// Create an individual.
pub fn cmd_add(
    ctx: &Context,
    forename: Option<String>,
    surname: Option<String>,
    sex: Option<&str>,
) -> Result<(), FamtreeError> {
    let sex = sex.map(Sex::parse_optional).transpose()?.flatten();
    let mut session = Session::with_store(storage::load_store(&ctx.database)?);
    let id = session.create_individual();
    {
        let individual = session.store_mut().individual_mut(&id)?;
        if let Some(forename) = forename {
            individual.set_forename(forename);
        }
        if let Some(surname) = surname {
            individual.set_surname(surname);
        }
    }
    if sex.is_some() {
        IntegrityEngine::set_sex(session.store_mut(), &id, sex)?;
    }
    save(ctx, session.store())?;
    tracing::info!(%id, "created individual");
    println!("{id}");
    Ok(())
}

/// Set an individual attribute.
pub fn cmd_set(ctx: &Context, id: &str, attribute: &str, value: &str) -> Result<(), FamtreeError> {
    let attribute: IndividualAttribute = attribute.parse()?;
    let mut store = storage::load_store(&ctx.database)?;
    let id = IndividualId::new(id);
    IntegrityEngine::set_attribute(&mut store, &id, attribute, value)?;
    save(ctx, &store)?;
    tracing::info!(%id, %attribute, "set attribute");
    Ok(())
}

/// Set a family attribute, creating the family if needed.
pub fn cmd_set_family(
    ctx: &Context,
    id: &str,
    attribute: &str,
    value: &str,
    family: Option<&str>,
) -> Result<(), FamtreeError> {
    let attribute: FamilyAttribute = attribute.parse()?;
    let mut store = storage::load_store(&ctx.database)?;
    let id = IndividualId::new(id);
    let family = family.map(FamilyId::new);
    let before = store.family_count();
    let target =
        IntegrityEngine::set_family_attribute(&mut store, &id, attribute, value, family.as_ref())?;
    save(ctx, &store)?;
    if store.family_count() > before {
        tracing::info!(%id, family = %target, "created family");
    }
    tracing::info!(family = %target, %attribute, "set family attribute");
    Ok(())
}

/// Create a relationship.
pub fn cmd_link(ctx: &Context, link: LinkCommand) -> Result<(), FamtreeError> {
    let mut store = storage::load_store(&ctx.database)?;
    let before = store.family_count();
    let family = match &link {
        LinkCommand::Spouse { a, b, family } => IntegrityEngine::set_spouse(
            &mut store,
            &IndividualId::new(a.as_str()),
            &IndividualId::new(b.as_str()),
            family.as_deref().map(FamilyId::new).as_ref(),
        )?,
        LinkCommand::Father { child, father } => IntegrityEngine::set_father(
            &mut store,
            &IndividualId::new(child.as_str()),
            &IndividualId::new(father.as_str()),
        )?,
        LinkCommand::Mother { child, mother } => IntegrityEngine::set_mother(
            &mut store,
            &IndividualId::new(child.as_str()),
            &IndividualId::new(mother.as_str()),
        )?,
        LinkCommand::Child {
            parent,
            child,
            family,
        } => IntegrityEngine::set_child(
            &mut store,
            &IndividualId::new(parent.as_str()),
            &IndividualId::new(child.as_str()),
            family.as_deref().map(FamilyId::new).as_ref(),
        )?,
    };
    save(ctx, &store)?;

    let created = store.family_count() > before;
    tracing::info!(?link, %family, created, "linked");
    if ctx.json_mode {
        return print_json(&serde_json::json!({ "family": family, "created": created }));
    }
    println!("{family}");
    Ok(())
}

/// Remove a relationship.
pub fn cmd_unlink(ctx: &Context, unlink: UnlinkCommand) -> Result<(), FamtreeError> {
    let mut store = storage::load_store(&ctx.database)?;
    let before = store.family_count();
    let family = match &unlink {
        UnlinkCommand::Spouse { id, family } => IntegrityEngine::remove_spouse(
            &mut store,
            &IndividualId::new(id.as_str()),
            family.as_deref().map(FamilyId::new).as_ref(),
        )?,
        UnlinkCommand::Parents { id } => {
            IntegrityEngine::remove_parents(&mut store, &IndividualId::new(id.as_str()))?
        }
        UnlinkCommand::Child { parent, child } => Some(IntegrityEngine::remove_child(
            &mut store,
            &IndividualId::new(parent.as_str()),
            &IndividualId::new(child.as_str()),
        )?),
    };
    let Some(family) = family else {
        tracing::warn!(?unlink, "nothing to unlink");
        return Ok(());
    };
    save(ctx, &store)?;

    let removed = before.saturating_sub(store.family_count());
    tracing::info!(?unlink, %family, families_removed = removed, "unlinked");
    Ok(())
}

/// Delete a record with full cascade.
pub fn cmd_delete(ctx: &Context, delete: DeleteCommand) -> Result<(), FamtreeError> {
    let store = storage::load_store(&ctx.database)?;
    let families_before = store.family_count();

    match delete {
        DeleteCommand::Individual { id } => {
            let id = IndividualId::new(id);
            let mut session = Session::with_store(store);
            session.select(&id)?;
            let adjacent = session.delete_individual(&id)?;
            let removed = families_before.saturating_sub(session.store().family_count());
            save(ctx, session.store())?;

            tracing::info!(%id, families_removed = removed, "deleted individual");
            if ctx.json_mode {
                return print_json(&serde_json::json!({
                    "deleted": id,
                    "selected": session.selected(),
                    "families_removed": removed,
                }));
            }
            if let Some(next) = adjacent {
                println!("Selected {}", label(session.store(), &next));
            }
        }
        DeleteCommand::Family { id } => {
            let id = FamilyId::new(id);
            let mut store = store;
            IntegrityEngine::delete_family(&mut store, &id)?;
            save(ctx, &store)?;
            tracing::info!(%id, "deleted family");
        }
    }
    Ok(())
}

// =============================================================================
// READ COMMANDS
// =============================================================================

/// Run a relationship query.
pub fn cmd_query(ctx: &Context, command: QueryCommand) -> Result<(), FamtreeError> {
    let store = storage::load_store(&ctx.database)?;
    let engine = QueryEngine::new(&store);

    let query = match command {
        QueryCommand::Parents { id } => Query::Parents(IndividualId::new(id)),
        QueryCommand::Siblings { id } => Query::Siblings(IndividualId::new(id)),
        QueryCommand::Spouses { id } => Query::Spouses(IndividualId::new(id)),
        QueryCommand::Children { id, family } => Query::Children {
            individual: IndividualId::new(id),
            family: family.map(FamilyId::new),
        },
        QueryCommand::Roots { id } => Query::AncestorRoots(IndividualId::new(id)),
        QueryCommand::Ancestors { id } => {
            let id = IndividualId::new(id);
            store.get_individual(&id)?;
            let ancestors = engine.ancestors(&id)?;
            if ctx.json_mode {
                return print_json(&serde_json::json!({ "ancestors": ancestors }));
            }
            for ancestor in &ancestors {
                println!("{}", label(&store, ancestor));
            }
            return Ok(());
        }
    };
    store.get_individual(query.subject())?;
    let result = engine.execute(&query)?;

    if ctx.json_mode {
        return print_json(&result);
    }
    match result {
        QueryResult::Parents(parents) => {
            println!("Father: {}", optional_label(&store, parents.father.as_ref()));
            println!("Mother: {}", optional_label(&store, parents.mother.as_ref()));
        }
        QueryResult::Siblings(siblings) => {
            for sibling in &siblings.siblings {
                println!("{}", label(&store, sibling));
            }
        }
        QueryResult::Spouses { spouses } => {
            for link in &spouses {
                let family = link.family.as_ref().map(ToString::to_string).unwrap_or_default();
                println!("{family} {}", optional_label(&store, link.spouse.as_ref()));
            }
        }
        QueryResult::Children { children } => {
            for child in &children {
                println!("{}", label(&store, child));
            }
        }
        QueryResult::AncestorRoots { roots } => {
            for root in &roots {
                println!("{}", label(&store, root));
            }
        }
    }
    Ok(())
}

/// Default collation file name: compact name plus a suffix.
fn collate_output(
    ctx: &Context,
    store: &RecordStore,
    id: &IndividualId,
    suffix: &str,
    output: Option<PathBuf>,
) -> Result<PathBuf, FamtreeError> {
    let path = match output {
        Some(path) => path,
        None => {
            let name = store.get_individual(id)?.compact_name();
            let extension = match ctx.format {
                crate::config::StoreFormat::Binary => "ftree",
                crate::config::StoreFormat::Json => "json",
            };
            PathBuf::from(format!("{name}_{suffix}.{extension}"))
        }
    };
    storage::validate_output_path(&path)
}

/// Copy a connected subset into a new store file.
pub fn cmd_collate(ctx: &Context, command: CollateCommand) -> Result<(), FamtreeError> {
    let store = storage::load_store(&ctx.database)?;
    let (collated, path) = match command {
        CollateCommand::Ancestors {
            id,
            output,
            siblings,
        } => {
            let id = IndividualId::new(id);
            let collated = collate_ancestors(&store, &id, siblings)?;
            (collated, collate_output(ctx, &store, &id, "ancestors", output)?)
        }
        CollateCommand::Descendants {
            id,
            output,
            siblings,
        } => {
            let id = IndividualId::new(id);
            let collated = collate_descendants(&store, &id, siblings)?;
            (collated, collate_output(ctx, &store, &id, "descendants", output)?)
        }
        CollateCommand::Family { id, output } => {
            let id = IndividualId::new(id);
            let collated = collate_family_members(&store, &id)?;
            (collated, collate_output(ctx, &store, &id, "family", output)?)
        }
    };

    storage::save_store(&collated, &path, ctx.format)?;
    tracing::info!(
        path = %path.display(),
        individuals = collated.individual_count(),
        families = collated.family_count(),
        "collated store written"
    );
    println!("{}", path.display());
    Ok(())
}

/// Build a projection and write it as DOT or JSON.
pub fn cmd_graph(
    ctx: &Context,
    root: Option<&str>,
    ancestors: Option<bool>,
    descendants: Option<bool>,
    output: Option<&Path>,
    output_format: Option<OutputFormat>,
) -> Result<(), FamtreeError> {
    let store = storage::load_store(&ctx.database)?;
    let graph = &ctx.config.graph;
    let options = ProjectionOptions {
        root: root.map(IndividualId::new),
        ancestors: ancestors.unwrap_or(graph.ancestors),
        descendants: descendants.unwrap_or(graph.descendants),
    };
    let format = output_format.unwrap_or(graph.output_format);

    let projection = ProjectionBuilder::build(&store, &options)?;
    let text = render::render(&projection, format)?;
    tracing::debug!(
        nodes = projection.node_count(),
        edges = projection.edge_count(),
        ?format,
        "built projection"
    );

    match output {
        Some(path) => {
            let path = storage::validate_output_path(path)?;
            std::fs::write(&path, text)
                .map_err(|e| FamtreeError::IoError(format!("Write '{}': {e}", path.display())))?;
            println!("{}", path.display());
        }
        None => print!("{text}"),
    }
    Ok(())
}
