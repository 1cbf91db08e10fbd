use axum::response::Html;

static LOGIN_HTML: &str = r#"<!doctype html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>Fail2ban Dashboard - Login</title>
<script src="https://cdn.tailwindcss.com"></script>
</head>
<body class="bg-gray-100 flex items-center justify-center h-screen">
<form method="post" action="/login" class="bg-white p-8 rounded shadow w-80">
  <h1 class="text-xl font-bold mb-4">Fail2ban Dashboard</h1>
  {{error}}
  <input name="username" placeholder="Username" class="border w-full p-2 mb-2" autofocus>
  <input name="password" type="password" placeholder="Password" class="border w-full p-2 mb-4">
  <button class="bg-blue-600 text-white w-full p-2 rounded">Sign in</button>
</form>
</body>
</html>
"#;

static INDEX_HTML: &str = r#"<!doctype html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>Fail2ban Dashboard</title>
<script src="https://cdn.tailwindcss.com"></script>
</head>
<body class="bg-gray-100 p-6">
<div class="flex justify-between mb-6">
  <h1 class="text-2xl font-bold">Fail2ban Jails</h1>
  <a href="/logout" class="text-gray-600">Logout</a>
</div>
<div id="jails" class="grid grid-cols-1 md:grid-cols-3 gap-4"></div>
<script>
fetch('/api/jails').then(r => r.json()).then(body => {
  const root = document.getElementById('jails');
  for (const jail of body.jails || []) {
    const card = document.createElement('a');
    card.href = '/detail/' + encodeURIComponent(jail.name);
    card.className = 'block bg-white rounded shadow p-4 border-l-4 ' + jail.color.border;
    const title = document.createElement('h2');
    title.className = 'font-bold ' + jail.color.text;
    title.textContent = jail.name;
    const stats = document.createElement('p');
    stats.textContent = `banned ${jail.currently_banned} (total ${jail.total_banned}), failed ${jail.currently_failed} (total ${jail.total_failed})`;
    card.append(title, stats);
    root.append(card);
  }
});
</script>
</body>
</html>
"#;

static DETAIL_HTML: &str = r#"<!doctype html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>Fail2ban Jail</title>
<script src="https://cdn.tailwindcss.com"></script>
</head>
<body class="bg-gray-100 p-6">
<a href="/" class="text-gray-600">&larr; all jails</a>
<h1 id="title" class="text-2xl font-bold my-4"></h1>
<table class="bg-white rounded shadow w-full mb-6"><tbody id="banned"></tbody></table>
<table class="bg-white rounded shadow w-full"><tbody id="logs"></tbody></table>
<script>
const jail = decodeURIComponent(location.pathname.split('/').pop());
document.getElementById('title').textContent = jail;
function row(cells) {
  const tr = document.createElement('tr');
  for (const c of cells) {
    const td = document.createElement('td');
    td.className = 'p-2 border-b';
    td.textContent = c;
    tr.append(td);
  }
  return tr;
}
const base = encodeURIComponent(jail);
fetch('/api/jail/' + base).then(r => r.json()).then(body => {
  const tbody = document.getElementById('banned');
  for (const ip of (body.jail && body.jail.banned_ips) || []) {
    tbody.append(row([ip.ip, ip.reject_count, ip.country.country, ip.country.isp]));
  }
});
fetch('/api/logs/' + base).then(r => r.json()).then(body => {
  const tbody = document.getElementById('logs');
  for (const rec of body.logs || []) {
    tbody.append(row([rec.ip, rec.count, rec.last_seen || '']));
  }
});
</script>
</body>
</html>
"#;

pub fn login_html(error: Option<&str>) -> String {
    let err_block = match error {
        Some(msg) => format!(r#"<div class="text-red-600 mb-2">{}</div>"#, msg),
        None => String::new(),
    };
    LOGIN_HTML.replace("{{error}}", &err_block)
}

pub async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

pub async fn detail() -> Html<&'static str> {
    Html(DETAIL_HTML)
}
