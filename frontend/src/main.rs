mod aggregate;
mod api;
mod categories;
mod chart;
mod entry;
mod settings;
mod sortable;
mod sync;
mod table;

use std::rc::Rc;

use wasm_bindgen_futures::spawn_local;
use web_sys::{Event, HtmlInputElement, HtmlSelectElement, InputEvent};
use yew::prelude::*;

use crate::api::HttpApi;
use crate::categories::CATEGORIES;
use crate::chart::{ChartData, ChartJsSurface, ChartSlot};
use crate::entry::{Entry, EntryDraft, EntryId};
use crate::settings::{init_logging, load_settings, save_settings, AppConfig};
use crate::sortable::{SortDirection, SortableTable};
use crate::sync::{BrowserWindow, ExitGuard, LedgerViews, SyncController, SyncError};
use crate::table::{RenderedRow, ACTIONS_COLUMN, BALANCE_HEADERS, ENTRY_HEADERS};

type Controller = SyncController<HttpApi, BrowserWindow>;

const CHART_CANVAS_ID: &str = "moneyChart";

#[derive(Clone, Copy, PartialEq)]
enum TableKind {
    All,
    Current,
}

#[derive(Clone, PartialEq)]
struct EditSession {
    table: TableKind,
    id: EntryId,
    draft: EntryDraft,
}

/// The three tables as currently displayed. Rebuilt from scratch on every
/// resync, which also resets their sort direction.
#[derive(Clone, PartialEq)]
struct Tables {
    all: SortableTable,
    current: SortableTable,
    balance: SortableTable,
}

impl Tables {
    fn attach(views: &LedgerViews) -> Self {
        Tables {
            all: SortableTable::attach(views.all.clone(), Some(ACTIONS_COLUMN)),
            current: SortableTable::attach(views.current.clone(), Some(ACTIONS_COLUMN)),
            balance: SortableTable::attach(views.balance.clone(), None),
        }
    }

    fn all_mut(&mut self) -> &mut SortableTable {
        &mut self.all
    }

    fn current_mut(&mut self) -> &mut SortableTable {
        &mut self.current
    }

    fn balance_mut(&mut self) -> &mut SortableTable {
        &mut self.balance
    }
}

fn bind_input(state: UseStateHandle<String>) -> Callback<InputEvent> {
    Callback::from(move |e: InputEvent| {
        if let Some(input) = e.target_dyn_into::<HtmlInputElement>() {
            state.set(input.value());
        }
    })
}

fn bind_select(state: UseStateHandle<String>) -> Callback<Event> {
    Callback::from(move |e: Event| {
        if let Some(select) = e.target_dyn_into::<HtmlSelectElement>() {
            state.set(select.value());
        }
    })
}

fn category_options(selected: &str) -> Html {
    html! {
        { for CATEGORIES.iter().map(|c| html! {
            <option value={c.key} selected={c.key == selected}>{ c.label }</option>
        }) }
    }
}

#[function_component(App)]
fn app() -> Html {
    let config = use_context::<AppConfig>().unwrap_or_default();
    let sync = {
        let config = config.clone();
        use_state(move || {
            let guard = ExitGuard::new(config.warn_on_exit);
            Rc::new(Controller::new(
                HttpApi::new(config.clone()),
                BrowserWindow::new(config),
                guard,
            ))
        })
    };

    let tables = use_state(|| Tables::attach(&LedgerViews::default()));
    let chart_data = use_state(ChartData::default);
    let skipped = use_state(|| 0usize);
    let loading = use_state(|| true);
    let error = use_state(|| None::<String>);
    let editing = use_state(|| None::<EditSession>);

    let form_date = {
        let sync = sync.clone();
        use_state(move || sync.last_date())
    };
    let form_amount = use_state(String::new);
    let form_description = use_state(String::new);
    let form_category = use_state(|| CATEGORIES[0].key.to_string());

    // Every fetch lands here; whichever resolves last is what stays on screen.
    let on_synced = {
        let tables = tables.clone();
        let chart_data = chart_data.clone();
        let skipped = skipped.clone();
        let loading = loading.clone();
        let error = error.clone();
        let editing = editing.clone();
        Callback::from(move |result: Result<LedgerViews, SyncError>| {
            loading.set(false);
            match result {
                Ok(views) => {
                    tables.set(Tables::attach(&views));
                    skipped.set(views.skipped);
                    chart_data.set(views.chart);
                    editing.set(None);
                    error.set(None);
                }
                // already reported by an alert, and the edit stays open
                Err(SyncError::UpdateRejected { .. }) => {}
                Err(err) => error.set(Some(err.to_string())),
            }
        })
    };

    {
        let sync = sync.clone();
        let on_synced = on_synced.clone();
        use_effect_with_deps(
            move |_| {
                let sync = (*sync).clone();
                spawn_local(async move {
                    on_synced.emit(sync.resync().await);
                });
                || ()
            },
            (),
        );
    }

    {
        let sync = sync.clone();
        use_effect_with_deps(
            move |warn_on_exit| {
                let listener = if *warn_on_exit {
                    sync.guard().listen()
                } else {
                    None
                };
                move || drop(listener)
            },
            config.warn_on_exit,
        );
    }

    let on_submit = {
        let sync = sync.clone();
        let on_synced = on_synced.clone();
        let form_date = form_date.clone();
        let form_amount = form_amount.clone();
        let form_description = form_description.clone();
        let form_category = form_category.clone();
        let error = error.clone();

        Callback::from(move |_| {
            let sync = (*sync).clone();
            let on_synced = on_synced.clone();
            let form_date = form_date.clone();
            let form_amount = form_amount.clone();
            let form_description = form_description.clone();
            let form_category = form_category.clone();
            let error = error.clone();

            let draft = EntryDraft {
                date: (*form_date).clone(),
                amount: (*form_amount).clone(),
                description: (*form_description).clone(),
                category: (*form_category).clone(),
            };

            spawn_local(async move {
                match sync.create(&draft).await {
                    Ok(views) => {
                        form_date.set(sync.last_date());
                        form_amount.set(String::new());
                        form_description.set(String::new());
                        form_category.set(CATEGORIES[0].key.to_string());
                        on_synced.emit(Ok(views));
                    }
                    Err(SyncError::Invalid(err)) => {
                        error.set(Some(format!("Entrée invalide : {}", err)));
                    }
                    Err(err) => on_synced.emit(Err(err)),
                }
            });
        })
    };

    let on_delete = {
        let sync = sync.clone();
        let on_synced = on_synced.clone();
        Callback::from(move |id: EntryId| {
            let sync = (*sync).clone();
            let on_synced = on_synced.clone();
            spawn_local(async move {
                match sync.delete(id).await {
                    Ok(Some(views)) => on_synced.emit(Ok(views)),
                    Ok(None) => {}
                    Err(err) => on_synced.emit(Err(err)),
                }
            });
        })
    };

    let start_edit = |table: TableKind| {
        let editing = editing.clone();
        Callback::from(move |entry: Entry| {
            editing.set(Some(EditSession {
                table,
                id: entry.id,
                draft: EntryDraft::from_entry(&entry),
            }));
        })
    };

    let on_draft = {
        let editing = editing.clone();
        Callback::from(move |draft: EntryDraft| {
            if let Some(session) = (*editing).clone() {
                editing.set(Some(EditSession { draft, ..session }));
            }
        })
    };

    let on_save_edit = {
        let sync = sync.clone();
        let on_synced = on_synced.clone();
        let editing = editing.clone();
        Callback::from(move |_| {
            let Some(session) = (*editing).clone() else {
                return;
            };
            let sync = (*sync).clone();
            let on_synced = on_synced.clone();
            spawn_local(async move {
                on_synced.emit(sync.update(session.id, &session.draft).await);
            });
        })
    };

    let on_cancel_edit = {
        let sync = sync.clone();
        let on_synced = on_synced.clone();
        Callback::from(move |_| {
            let sync = (*sync).clone();
            let on_synced = on_synced.clone();
            spawn_local(async move {
                on_synced.emit(sync.cancel_edit().await);
            });
        })
    };

    let sort = |pick: fn(&mut Tables) -> &mut SortableTable| {
        let tables = tables.clone();
        Callback::from(move |column: usize| {
            let mut next = (*tables).clone();
            if pick(&mut next).sort_by_column(column) {
                tables.set(next);
            }
        })
    };

    let on_save_server = {
        let sync = sync.clone();
        let error = error.clone();
        Callback::from(move |_| {
            let sync = (*sync).clone();
            let error = error.clone();
            spawn_local(async move {
                if let Err(err) = sync.save_to_server().await {
                    error.set(Some(err.to_string()));
                }
            });
        })
    };

    let on_local_copy = {
        let sync = sync.clone();
        Callback::from(move |_| sync.local_copy())
    };

    let on_logout = {
        let sync = sync.clone();
        Callback::from(move |_| sync.logout())
    };

    let editing_in = |table: TableKind| {
        (*editing)
            .clone()
            .filter(|session| session.table == table)
    };

    html! {
        <div class="min-h-screen bg-background">
            <header class="bg-[#D8E1E8] border-b border-border h-16 flex items-center justify-between px-6">
                <span class="text-[#173E63] text-2xl font-black tracking-tight">{"Carnet de comptes"}</span>
                <div class="flex items-center gap-2">
                    <button onclick={on_save_server} class="flex items-center gap-2 px-4 py-2 rounded-xl hover:bg-white/40 text-sm font-medium">
                        { icon_save() }<span>{"Sauvegarder"}</span>
                    </button>
                    <button onclick={on_local_copy} class="flex items-center gap-2 px-4 py-2 rounded-xl hover:bg-white/40 text-sm font-medium">
                        { icon_download() }<span>{"Copie locale"}</span>
                    </button>
                    <button onclick={on_logout} class="flex items-center gap-2 px-4 py-2 rounded-xl hover:bg-white/40 text-sm font-medium">
                        { icon_log_out() }<span>{"Déconnexion"}</span>
                    </button>
                </div>
            </header>

            <main>
                { page_shell(
                    "Mes comptes",
                    html! {},
                    html! {
                        <>
                            {
                                if let Some(msg) = &*error {
                                    html! { <p class="text-sm text-red-500">{ msg.clone() }</p> }
                                } else if *skipped > 0 {
                                    html! { <p class="text-xs text-muted-foreground">{ format!("{} ligne(s) illisible(s) ignorée(s).", *skipped) }</p> }
                                } else {
                                    html! {}
                                }
                            }

                            <div class="bg-card rounded-[10px] p-6 border border-border">
                                <h3 class="font-bold text-foreground text-lg mb-3">{"Nouvelle entrée"}</h3>
                                <div class="grid grid-cols-1 md:grid-cols-5 gap-3">
                                    <input type="date" value={(*form_date).clone()} oninput={bind_input(form_date.clone())} class="p-2 border rounded" />
                                    <input type="number" step="0.01" placeholder="Montant" value={(*form_amount).clone()} oninput={bind_input(form_amount.clone())} class="p-2 border rounded" />
                                    <input placeholder="Description" value={(*form_description).clone()} oninput={bind_input(form_description.clone())} class="p-2 border rounded" />
                                    <select onchange={bind_select(form_category.clone())} class="p-2 border rounded">
                                        { category_options(&form_category) }
                                    </select>
                                    <button onclick={on_submit} class="flex items-center justify-center gap-2 bg-primary text-primary-foreground px-4 py-2 rounded-xl font-bold text-sm hover:opacity-90">
                                        { icon_plus() }{"Ajouter"}
                                    </button>
                                </div>
                            </div>

                            <div class="bg-card rounded-[10px] p-6 border border-border">
                                <canvas id={CHART_CANVAS_ID}></canvas>
                                <MonthlyChart data={(*chart_data).clone()} />
                            </div>

                            <LedgerTable
                                title="Ce mois-ci"
                                headers={&ENTRY_HEADERS[..]}
                                table={tables.current.clone()}
                                loading={*loading}
                                actions=true
                                editing={editing_in(TableKind::Current)}
                                on_sort={sort(Tables::current_mut)}
                                on_delete={on_delete.clone()}
                                on_edit={start_edit(TableKind::Current)}
                                on_draft={on_draft.clone()}
                                on_save={on_save_edit.clone()}
                                on_cancel={on_cancel_edit.clone()}
                            />

                            <LedgerTable
                                title="Solde mensuel"
                                headers={&BALANCE_HEADERS[..]}
                                table={tables.balance.clone()}
                                loading={*loading}
                                actions=false
                                editing={None::<EditSession>}
                                on_sort={sort(Tables::balance_mut)}
                                on_delete={Callback::noop()}
                                on_edit={Callback::noop()}
                                on_draft={Callback::noop()}
                                on_save={Callback::noop()}
                                on_cancel={Callback::noop()}
                            />

                            <LedgerTable
                                title="Toutes les entrées"
                                headers={&ENTRY_HEADERS[..]}
                                table={tables.all.clone()}
                                loading={*loading}
                                actions=true
                                editing={editing_in(TableKind::All)}
                                on_sort={sort(Tables::all_mut)}
                                on_delete={on_delete}
                                on_edit={start_edit(TableKind::All)}
                                on_draft={on_draft}
                                on_save={on_save_edit}
                                on_cancel={on_cancel_edit}
                            />
                        </>
                    }
                ) }
            </main>
        </div>
    }
}

fn page_shell(title: &'static str, actions: Html, children: Html) -> Html {
    html! {
        <div class="p-6 max-w-7xl mx-auto">
            <div class="flex items-center justify-between pb-4 border-b border-border">
                <h1 class="text-2xl font-bold text-foreground">{ title }</h1>
                { actions }
            </div>
            <div class="pt-5 space-y-6">
                { children }
            </div>
        </div>
    }
}

#[derive(Properties, PartialEq)]
struct MonthlyChartProps {
    data: ChartData,
}

/// Draws into the page's chart canvas. The chart handle lives as long as
/// this component and is rebuilt whenever the data changes.
#[function_component(MonthlyChart)]
fn monthly_chart(props: &MonthlyChartProps) -> Html {
    let slot = use_mut_ref(|| ChartSlot::new(ChartJsSurface::new(CHART_CANVAS_ID)));

    {
        let slot = slot.clone();
        use_effect_with_deps(
            move |data: &ChartData| {
                let mut slot = slot.borrow_mut();
                tracing::debug!(replacing = slot.is_drawn(), series = data.datasets.len(), "drawing monthly chart");
                if let Err(err) = slot.replace(data) {
                    tracing::warn!(error = %err, "chart not drawn");
                }
                || ()
            },
            props.data.clone(),
        );
    }

    {
        let slot = slot.clone();
        use_effect_with_deps(move |_| move || slot.borrow_mut().clear(), ());
    }

    html! {}
}

#[derive(Properties, PartialEq)]
struct LedgerTableProps {
    title: &'static str,
    headers: &'static [&'static str],
    table: SortableTable,
    loading: bool,
    actions: bool,
    editing: Option<EditSession>,
    on_sort: Callback<usize>,
    on_delete: Callback<EntryId>,
    on_edit: Callback<Entry>,
    on_draft: Callback<EntryDraft>,
    on_save: Callback<()>,
    on_cancel: Callback<()>,
}

#[function_component(LedgerTable)]
fn ledger_table(props: &LedgerTableProps) -> Html {
    let colspan = props.headers.len().to_string();
    let sort_hint = match props.table.direction() {
        SortDirection::Ascending => "Trier (croissant)",
        SortDirection::Descending => "Trier (décroissant)",
    };

    html! {
        <div class="bg-card rounded-[10px] shadow-sm border border-border overflow-hidden">
            <div class="p-6 border-b border-border">
                <h3 class="font-bold text-foreground text-lg">{ props.title }</h3>
            </div>
            <div class="overflow-x-auto">
                <table class="w-full text-left border-collapse">
                    <thead>
                        <tr class="bg-muted/50 text-muted-foreground text-[10px] uppercase tracking-widest">
                            { for props.headers.iter().enumerate().map(|(column, title)| {
                                let sortable = props.table.is_sortable(column);
                                let on_sort = props.on_sort.clone();
                                html! {
                                    <th
                                        class="px-6 py-4 font-bold"
                                        style={if sortable { "cursor: pointer" } else { "" }}
                                        title={if sortable { sort_hint } else { "" }}
                                        onclick={Callback::from(move |_| on_sort.emit(column))}
                                    >
                                        { *title }
                                    </th>
                                }
                            }) }
                        </tr>
                    </thead>
                    <tbody class="divide-y divide-border">
                        { if props.loading {
                            html! { <tr><td colspan={colspan} class="px-6 py-6 text-center text-muted-foreground">{"Chargement..."}</td></tr> }
                        } else if props.table.rows().is_empty() {
                            html! { <tr><td colspan={colspan} class="px-6 py-6 text-center text-muted-foreground">{"Aucune entrée."}</td></tr> }
                        } else {
                            html! {
                                { for props.table.rows().iter().enumerate().map(|(idx, row)| {
                                    match (&props.editing, row.id()) {
                                        (Some(session), Some(id)) if session.id == id => edit_row(session, props),
                                        _ => display_row(idx, row, props),
                                    }
                                }) }
                            }
                        }}
                    </tbody>
                </table>
            </div>
        </div>
    }
}

fn display_row(idx: usize, row: &RenderedRow, props: &LedgerTableProps) -> Html {
    let key = row
        .id()
        .map(|id| id.to_string())
        .unwrap_or_else(|| format!("row-{}", idx));

    let actions = match (&row.entry, props.actions) {
        (Some(entry), true) => {
            let on_delete = props.on_delete.clone();
            let on_edit = props.on_edit.clone();
            let id = entry.id;
            let entry = entry.clone();
            html! {
                <td class="px-6 py-3">
                    <div class="flex gap-2">
                        <button aria-label="Supprimer" onclick={Callback::from(move |_| on_delete.emit(id))}>{ icon_trash() }</button>
                        <button aria-label="Modifier" onclick={Callback::from(move |_| on_edit.emit(entry.clone()))}>{ icon_pencil() }</button>
                    </div>
                </td>
            }
        }
        _ => html! {},
    };

    html! {
        <tr key={key} class="text-sm hover:bg-muted/30 transition-colors">
            { for row.cells.iter().map(|cell| html! {
                <td class={classes!("px-6", "py-3", cell.class.clone())} style={cell.style.clone()}>{ cell.text.clone() }</td>
            }) }
            { actions }
        </tr>
    }
}

fn edit_row(session: &EditSession, props: &LedgerTableProps) -> Html {
    let field = |apply: fn(&mut EntryDraft, String)| {
        let draft = session.draft.clone();
        let on_draft = props.on_draft.clone();
        Callback::from(move |e: InputEvent| {
            if let Some(input) = e.target_dyn_into::<HtmlInputElement>() {
                let mut next = draft.clone();
                apply(&mut next, input.value());
                on_draft.emit(next);
            }
        })
    };

    let on_category = {
        let draft = session.draft.clone();
        let on_draft = props.on_draft.clone();
        Callback::from(move |e: Event| {
            if let Some(select) = e.target_dyn_into::<HtmlSelectElement>() {
                on_draft.emit(EntryDraft {
                    category: select.value(),
                    ..draft.clone()
                });
            }
        })
    };

    let on_save = props.on_save.clone();
    let on_cancel = props.on_cancel.clone();
    let draft = &session.draft;

    html! {
        <tr key={session.id.to_string()} class="text-sm bg-muted/30">
            <td class="px-3 py-2 editable-cell">
                <input type="date" value={draft.date.clone()} oninput={field(|d, v| d.date = v)} class="p-1 border rounded" />
            </td>
            <td class="px-3 py-2 editable-cell">
                <input type="number" step="0.01" value={draft.amount.clone()} oninput={field(|d, v| d.amount = v)} class="p-1 border rounded w-24" />
            </td>
            <td class="px-3 py-2 editable-cell">
                <input type="text" value={draft.description.clone()} oninput={field(|d, v| d.description = v)} class="p-1 border rounded" />
            </td>
            <td class="px-3 py-2 editable-cell">
                <select onchange={on_category} class="p-1 border rounded">
                    { category_options(&draft.category) }
                </select>
            </td>
            <td class="px-3 py-2">
                <div class="flex gap-2">
                    <button aria-label="Enregistrer" onclick={Callback::from(move |_| on_save.emit(()))}>{ icon_save() }</button>
                    <button aria-label="Annuler" onclick={Callback::from(move |_| on_cancel.emit(()))}>{ icon_x() }</button>
                </div>
            </td>
        </tr>
    }
}

fn icon_base(path: &'static str) -> Html {
    html! {
        <svg width="20" height="20" viewBox="0 0 24 24" fill="none" stroke="currentColor" stroke-width="2" stroke-linecap="round" stroke-linejoin="round" class="text-foreground">
            <path d={path}></path>
        </svg>
    }
}

fn icon_trash() -> Html {
    icon_base("M3 6h18M8 6V4h8v2M19 6l-1 14H6L5 6")
}
fn icon_pencil() -> Html {
    icon_base("M12 20h9M16.5 3.5a2.1 2.1 0 013 3L7 19l-4 1 1-4z")
}
fn icon_save() -> Html {
    icon_base("M19 21H5a2 2 0 01-2-2V5a2 2 0 012-2h11l5 5v11a2 2 0 01-2 2zM17 21v-8H7v8M7 3v5h8")
}
fn icon_x() -> Html {
    icon_base("M18 6L6 18M6 6l12 12")
}
fn icon_download() -> Html {
    icon_base("M21 15v4a2 2 0 01-2 2H5a2 2 0 01-2-2v-4M7 10l5 5 5-5M12 15V3")
}
fn icon_log_out() -> Html {
    icon_base("M9 21H5a2 2 0 01-2-2V5a2 2 0 012-2h4M16 17l5-5-5-5M21 12H9")
}
fn icon_plus() -> Html {
    icon_base("M12 5v14M5 12h14")
}

#[derive(Properties, PartialEq)]
struct RootProps {
    config: AppConfig,
}

#[function_component(Root)]
fn root(props: &RootProps) -> Html {
    html! {
        <ContextProvider<AppConfig> context={props.config.clone()}>
            <App />
        </ContextProvider<AppConfig>>
    }
}

fn main() {
    let config = load_settings();
    save_settings(&config);
    init_logging(&config);
    tracing::info!(api = %config.api_base_url, "starting ledger frontend");
    yew::Renderer::<Root>::with_props(RootProps { config }).render();
}
