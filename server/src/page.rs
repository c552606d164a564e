//! The dashboard page. Renders whatever `/ws` pushes and posts actions to
//! `/api/actions`.

pub const INDEX_HTML: &str = r#"<!doctype html>
<html lang="en">
<head>
  <meta charset="utf-8" />
  <meta name="viewport" content="width=device-width,initial-scale=1" />
  <title>Staker Dashboard</title>
  <style>
    :root {
      --bg: #f5f4ef;
      --panel: #ffffff;
      --ink: #111827;
      --muted: #6b7280;
      --accent: #2563eb;
      --ok: #047857;
      --danger: #b91c1c;
      --border: #d1d5db;
      --mono: ui-monospace, SFMono-Regular, Menlo, Monaco, Consolas, monospace;
      --sans: "IBM Plex Sans", "Avenir Next", "Segoe UI", sans-serif;
    }
    body { margin: 0; background: var(--bg); color: var(--ink); font-family: var(--sans); }
    main { max-width: 760px; margin: 0 auto; padding: 24px; }
    h1 { font-size: 28px; margin: 0 0 16px; }
    section { background: var(--panel); border: 1px solid var(--border); border-radius: 8px; padding: 16px; margin-bottom: 16px; }
    .muted { color: var(--muted); font-size: 13px; }
    .big { font-size: 40px; font-family: var(--mono); }
    .bar { height: 14px; background: #e5e7eb; border-radius: 7px; overflow: hidden; }
    .bar > div { height: 100%; background: var(--accent); width: 0; transition: width .3s; }
    .banner { background: #ecfdf5; border-color: var(--ok); display: none; }
    button { font: inherit; padding: 8px 16px; margin-right: 8px; border-radius: 6px; border: 1px solid var(--border); background: var(--accent); color: #fff; cursor: pointer; }
    button:disabled { background: #e5e7eb; color: var(--muted); cursor: not-allowed; }
    button.preset { background: #fff; color: var(--ink); }
    button.preset.selected { border-color: var(--accent); color: var(--accent); }
    ul { list-style: none; padding: 0; margin: 0; font-family: var(--mono); font-size: 13px; }
    li { padding: 4px 0; border-bottom: 1px solid #f3f4f6; }
    .stale { color: var(--danger); }
    .failed { color: var(--danger); }
  </style>
</head>
<body>
<main>
  <h1>Staker</h1>
  <section class="banner" id="banner">
    <div class="big" id="external-balance">0</div>
    <div>ETH staked!</div>
  </section>
  <section>
    <div class="muted" id="headline">staking ends in</div>
    <div class="big" id="countdown">&hellip;</div>
  </section>
  <section>
    <div class="muted">Total staked / goal</div>
    <div class="big"><span id="total">&hellip;</span> / <span id="goal">&hellip;</span></div>
    <div class="bar"><div id="progress"></div></div>
    <div class="muted"><span id="percent">0</span>%</div>
  </section>
  <section>
    <div class="muted">You staked</div>
    <div class="big" id="caller">&hellip;</div>
    <div id="presets"></div>
    <p>
      <button id="stake" disabled>Stake</button>
      <button id="execute" disabled>Execute</button>
      <button id="withdraw" disabled>Withdraw</button>
    </p>
    <div class="muted" id="status"></div>
  </section>
  <section>
    <div class="muted">Transactions</div>
    <ul id="transactions"></ul>
  </section>
  <section>
    <div class="muted">Stake events</div>
    <ul id="events"></ul>
  </section>
  <section>
    <div class="muted">Sources</div>
    <ul id="sources"></ul>
  </section>
</main>
<script>
  let preset = "0.10";
  const $ = (id) => document.getElementById(id);

  function render(view) {
    const complete = view.completion.complete;
    $("banner").style.display = complete ? "block" : "none";
    $("external-balance").textContent = view.completion.external_balance_ether || "0";
    $("headline").textContent = view.countdown.headline;
    $("countdown").textContent = view.countdown.text;
    $("total").textContent = view.total_staked_ether || "…";
    $("goal").textContent = view.goal_ether || "…";
    $("caller").textContent = view.caller_stake_ether || "…";
    $("percent").textContent = view.progress_percent;
    $("progress").style.width = view.progress_percent + "%";
    $("stake").disabled = !view.eligibility.can_stake;
    $("execute").disabled = !view.eligibility.can_execute;
    $("withdraw").disabled = !view.eligibility.can_withdraw;

    const presets = $("presets");
    if (!presets.childElementCount) {
      for (const p of view.presets) {
        if (p.default) preset = p.label;
        const b = document.createElement("button");
        b.className = "preset";
        b.textContent = p.label + " ETH";
        b.dataset.label = p.label;
        b.onclick = () => { preset = p.label; markPreset(); };
        presets.appendChild(b);
      }
    }
    markPreset();

    $("events").innerHTML = view.history
      .map((e) => `<li>${e.from_short} staked ${e.amount_ether} ETH (block ${e.block_number})</li>`)
      .join("");
    $("transactions").innerHTML = view.recent_transactions
      .map((n) => {
        const cls = n.status.status === "failed" ? "failed" : "";
        const detail = n.status.reason ? `: ${n.status.reason}` : "";
        return `<li class="${cls}">tx#${n.id} ${n.request.action} ${n.status.status}${detail}</li>`;
      })
      .join("");
    $("sources").innerHTML = view.sources
      .map((s) => `<li class="${s.stale ? "stale" : ""}">${s.kind}: ${s.stale ? "stale" : "ok"}${s.last_good_block === null ? "" : " @ " + s.last_good_block}</li>`)
      .join("");
  }

  function markPreset() {
    for (const b of $("presets").children) {
      b.classList.toggle("selected", b.dataset.label === preset);
    }
  }

  async function act(body) {
    const res = await fetch("/api/actions", {
      method: "POST",
      headers: { "content-type": "application/json" },
      body: JSON.stringify(body),
    });
    const json = await res.json();
    $("status").textContent = res.ok ? `submitted tx#${json.id}` : json.error;
  }

  $("stake").onclick = () => act({ action: "stake", amount: preset });
  $("execute").onclick = () => act({ action: "execute" });
  $("withdraw").onclick = () => act({ action: "withdraw" });

  function connect() {
    const proto = location.protocol === "https:" ? "wss" : "ws";
    const ws = new WebSocket(`${proto}://${location.host}/ws`);
    ws.onmessage = (msg) => {
      const data = JSON.parse(msg.data);
      if (data.type === "view") render(data.view);
    };
    ws.onclose = () => setTimeout(connect, 2000);
  }

  fetch("/api/state").then((r) => r.json()).then(render);
  connect();
</script>
</body>
</html>
"#;
